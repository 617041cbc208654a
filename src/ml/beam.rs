// ============================================================
// Layer 5 — Beam Search Bookkeeping
// ============================================================
// Host-side half of beam search. The decoder produces log-probs
// for every live hypothesis on the device; this module picks the
// next `width` hypotheses and tells the caller which parent row
// each one came from so the recurrent state can be reordered.
//
// Scoring is the plain cumulative log-probability (no length
// penalty). Hypotheses start with scores [0, -inf, -inf, ...] so
// the first expansion only grows the single real hypothesis.
// A finished hypothesis proposes exactly one continuation: itself,
// with its score unchanged.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamSearchConfig {
    pub beam_width:  usize,
    pub start_token: u32,
    pub end_token:   u32,
    /// Upper bound on decoding steps
    pub max_steps:   usize,
}

/// One decoded caption with its cumulative log-probability.
/// `tokens` excludes <start> and the terminating <end>.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub tokens:   Vec<i64>,
    pub log_prob: f32,
    pub finished: bool,
}

impl Hypothesis {
    fn root(log_prob: f32) -> Self {
        Self { tokens: Vec::new(), log_prob, finished: false }
    }
}

#[derive(Debug)]
pub struct BeamSearch {
    beams:     Vec<Hypothesis>,
    end_token: i64,
}

impl BeamSearch {
    pub fn new(width: usize, end_token: u32) -> Self {
        let width = width.max(1);
        let beams = (0..width)
            .map(|i| Hypothesis::root(if i == 0 { 0.0 } else { f32::NEG_INFINITY }))
            .collect();
        Self { beams, end_token: end_token as i64 }
    }

    pub fn width(&self) -> usize {
        self.beams.len()
    }

    #[cfg(test)]
    pub fn beams(&self) -> &[Hypothesis] {
        &self.beams
    }

    /// Token each hypothesis feeds into the next decoder step.
    pub fn input_tokens(&self, start_token: u32) -> Vec<i64> {
        self.beams
            .iter()
            .map(|b| {
                if b.finished {
                    self.end_token
                } else {
                    b.tokens.last().copied().unwrap_or(start_token as i64)
                }
            })
            .collect()
    }

    /// Expand every hypothesis with `log_probs` (row-major [width, vocab])
    /// and keep the best `width`. Returns the parent row of each survivor.
    pub fn advance(&mut self, log_probs: &[f32], vocab_size: usize) -> Vec<i64> {
        let width = self.width();
        let mut candidates: Vec<(f32, usize, Option<i64>)> = Vec::with_capacity(width * vocab_size);

        for (row, beam) in self.beams.iter().enumerate() {
            if !beam.log_prob.is_finite() {
                continue;
            }
            if beam.finished {
                candidates.push((beam.log_prob, row, None));
                continue;
            }
            let scores = &log_probs[row * vocab_size..(row + 1) * vocab_size];
            for (token, &lp) in scores.iter().enumerate() {
                candidates.push((beam.log_prob + lp, row, Some(token as i64)));
            }
        }

        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        candidates.truncate(width);

        let mut next = Vec::with_capacity(width);
        let mut parents = Vec::with_capacity(width);
        for (score, row, token) in candidates {
            let parent = &self.beams[row];
            let mut hyp = Hypothesis { log_prob: score, ..parent.clone() };
            match token {
                Some(t) if t == self.end_token => hyp.finished = true,
                Some(t) => hyp.tokens.push(t),
                None => {}
            }
            next.push(hyp);
            parents.push(row as i64);
        }

        // Fewer candidates than slots: fill with dead hypotheses
        while next.len() < width {
            next.push(Hypothesis { finished: true, ..Hypothesis::root(f32::NEG_INFINITY) });
            parents.push(0);
        }

        self.beams = next;
        parents
    }

    /// True once every live hypothesis has emitted <end>.
    pub fn is_done(&self) -> bool {
        self.beams.iter().all(|b| b.finished || !b.log_prob.is_finite())
    }

    /// Highest-scoring hypothesis.
    pub fn into_best(self) -> Hypothesis {
        self.beams
            .into_iter()
            .max_by(|a, b| a.log_prob.partial_cmp(&b.log_prob).unwrap_or(Ordering::Equal))
            .unwrap_or_else(|| Hypothesis::root(f32::NEG_INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const END: u32 = 3;

    fn ln(p: f32) -> f32 {
        p.ln()
    }

    #[test]
    fn test_first_step_expands_only_the_root() {
        let mut search = BeamSearch::new(2, END);
        // vocab of 5; the second row would dominate if it were live
        let log_probs = [
            ln(0.1), ln(0.1), ln(0.1), ln(0.1), ln(0.6),
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let parents = search.advance(&log_probs, 5);

        assert_eq!(parents, vec![0, 0]);
        assert_eq!(search.beams()[0].tokens, vec![4]);
        assert_eq!(search.beams()[1].tokens, vec![0]);
        assert!((search.beams()[0].log_prob - ln(0.6)).abs() < 1e-6);
    }

    #[test]
    fn test_keeps_top_k_across_beams() {
        let mut search = BeamSearch::new(2, END);
        search.advance(&[ln(0.5), ln(0.4), ln(0.05), ln(0.05), -1e9, 0.0, 0.0, 0.0, 0.0, 0.0], 5);
        // beams: [0] score ln .5, [1] score ln .4
        let step = [
            ln(0.1), ln(0.1), ln(0.1), ln(0.1), ln(0.6),
            ln(0.9), ln(0.025), ln(0.025), ln(0.025), ln(0.025),
        ];
        let parents = search.advance(&step, 5);

        // 0.4 * 0.9 = 0.36 beats 0.5 * 0.6 = 0.30
        assert_eq!(parents, vec![1, 0]);
        assert_eq!(search.beams()[0].tokens, vec![1, 0]);
        assert_eq!(search.beams()[1].tokens, vec![0, 4]);
    }

    #[test]
    fn test_finished_hypothesis_carries_over() {
        let mut search = BeamSearch::new(2, END);
        search.advance(&[ln(0.1), ln(0.1), ln(0.1), ln(0.6), ln(0.1), 0.0, 0.0, 0.0, 0.0, 0.0], 5);
        assert!(search.beams()[0].finished);
        assert!(search.beams()[0].tokens.is_empty());
        assert!(!search.is_done());

        let score = search.beams()[0].log_prob;
        let step = [
            ln(0.99), -1e9, -1e9, -1e9, -1e9,
            ln(0.2), ln(0.2), ln(0.2), ln(0.2), ln(0.2),
        ];
        let parents = search.advance(&step, 5);

        assert_eq!(parents[0], 0);
        assert!(search.beams()[0].finished);
        assert_eq!(search.beams()[0].log_prob, score);
        assert_eq!(search.input_tokens(2)[0], END as i64);
    }

    #[test]
    fn test_done_when_all_finished() {
        let mut search = BeamSearch::new(2, END);
        search.advance(&[-1e9, -1e9, -1e9, ln(0.5), ln(0.5), 0.0, 0.0, 0.0, 0.0, 0.0], 5);
        assert!(!search.is_done());
        // the open hypothesis is forced onto <end>
        let step = [
            -1e9, -1e9, -1e9, -1e9, -1e9,
            -1e9, -1e9, -1e9, 0.0, -1e9,
        ];
        search.advance(&step, 5);
        assert!(search.is_done());

        let best = search.into_best();
        assert!(best.finished);
    }

    #[test]
    fn test_small_vocab_fills_dead_slots() {
        let mut search = BeamSearch::new(4, END);
        // vocab of 2 gives only two candidates on the first step
        let parents = search.advance(&[ln(0.7), ln(0.3), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 2);
        assert_eq!(parents.len(), 4);
        assert!(search.beams()[3].log_prob.is_infinite());
        assert_eq!(search.into_best().tokens, vec![0]);
    }

    #[test]
    fn test_input_tokens_start_with_start_token() {
        let search = BeamSearch::new(3, END);
        assert_eq!(search.input_tokens(2), vec![2, 2, 2]);
    }
}
