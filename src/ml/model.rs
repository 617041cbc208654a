// ============================================================
// Layer 5 — Caption Model
// ============================================================
// Encoder + attention decoder as one Burn module. A single
// CaptionModel value serves both paths:
//
//   forward / forward_loss  training, scheduled sampling,
//                           masked sequence loss
//   beam_search             inference on one image
//
// Caption layout (T = max(lengths) - 1 decoding steps):
//
//   captions   <start> a   dog  runs <end> <pad>
//   inputs     <start> a   dog  runs <end>        captions[:, :T]
//   targets    a       dog runs <end> <pad>       captions[:, 1:T+1]
//   mask       1       1   1    1     0           t < len - 1

use anyhow::Result;
use burn::{
    prelude::*,
    tensor::{activation::log_softmax, TensorData},
};

use crate::ml::{
    beam::{BeamSearch, BeamSearchConfig, Hypothesis},
    decoder::{AttentionDecoder, DecoderConfig},
    encoder::{EncoderConfig, ImageEncoder},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CaptionModelConfig {
    pub vocab_size:     usize,
    pub image_height:   usize,
    pub image_width:    usize,
    #[config(default = 256)]
    pub embedding_dim:  usize,
    #[config(default = 256)]
    pub rnn_size:       usize,
    #[config(default = 2)]
    pub num_layers:     usize,
    #[config(default = 64)]
    pub backbone_width: usize,
}

impl CaptionModelConfig {
    pub fn encoder(&self) -> EncoderConfig {
        EncoderConfig::new(self.rnn_size, self.image_height, self.image_width)
            .with_base_width(self.backbone_width)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionModel<B> {
        let encoder_cfg = self.encoder();
        let decoder = DecoderConfig::new(self.vocab_size, encoder_cfg.feature_channels())
            .with_embedding_dim(self.embedding_dim)
            .with_rnn_size(self.rnn_size)
            .with_num_layers(self.num_layers)
            .init(device);
        CaptionModel { encoder: encoder_cfg.init(device), decoder }
    }
}

#[derive(Module, Debug)]
pub struct CaptionModel<B: Backend> {
    pub encoder: ImageEncoder<B>,
    pub decoder: AttentionDecoder<B>,
}

/// Training-path output: logits with the targets and mask they
/// are scored against.
#[derive(Debug, Clone)]
pub struct CaptionOutput<B: Backend> {
    /// [batch, steps, vocab]
    pub logits:  Tensor<B, 3>,
    /// [batch, steps]
    pub targets: Tensor<B, 2, Int>,
    /// [batch, steps], 1.0 on valid positions
    pub mask:    Tensor<B, 2>,
}

impl<B: Backend> CaptionModel<B> {
    /// Freeze the first `frozen` backbone convolutions.
    pub fn freeze_backbone(self, frozen: usize) -> Self {
        Self { encoder: self.encoder.freeze(frozen), ..self }
    }

    pub fn forward(
        &self,
        images:   Tensor<B, 4>,
        captions: Tensor<B, 2, Int>,
        lengths:  &[usize],
        sampling_probability: f64,
    ) -> CaptionOutput<B> {
        let [batch, width] = captions.dims();
        let device = captions.device();
        let steps = decode_steps(lengths).min(width.saturating_sub(1));

        let inputs  = captions.clone().slice([0..batch, 0..steps]);
        let targets = captions.slice([0..batch, 1..steps + 1]);

        let encoded = self.encoder.forward(images);
        let memory  = self.decoder.memory(encoded.memory);
        let state   = self.decoder.initial_state(encoded.projection);
        let logits  = self
            .decoder
            .forward_scheduled(inputs, state, &memory, sampling_probability);

        CaptionOutput { logits, targets, mask: sequence_mask(lengths, steps, &device) }
    }

    pub fn forward_loss(
        &self,
        images:   Tensor<B, 4>,
        captions: Tensor<B, 2, Int>,
        lengths:  &[usize],
        sampling_probability: f64,
    ) -> (Tensor<B, 1>, CaptionOutput<B>) {
        let output = self.forward(images, captions, lengths, sampling_probability);
        let loss = sequence_loss(output.logits.clone(), output.targets.clone(), output.mask.clone());
        (loss, output)
    }

    /// Caption a single image ([1, 3, H, W]) with beam search.
    pub fn beam_search(&self, image: Tensor<B, 4>, config: &BeamSearchConfig) -> Result<Hypothesis> {
        let device = image.device();
        let mut search = BeamSearch::new(config.beam_width, config.end_token);
        let width = search.width();
        let vocab = self.decoder.vocab_size;

        // Encode once, then replicate across hypotheses
        let encoded = self.encoder.forward(image);
        let memory = self.decoder.memory(encoded.memory).tile(width);
        let mut state = self.decoder.initial_state(encoded.projection).tile(width);

        for _ in 0..config.max_steps {
            let tokens = Tensor::<B, 1, Int>::from_data(
                TensorData::new(search.input_tokens(config.start_token), [width]),
                &device,
            );
            let (logits, next) = self.decoder.step(tokens, state, &memory);

            let log_probs: Vec<f32> = log_softmax(logits, 1)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("Cannot read decoder output: {e:?}"))?;

            let parents = search.advance(&log_probs, vocab);
            state = next.select(Tensor::from_data(TensorData::new(parents, [width]), &device));

            if search.is_done() {
                break;
            }
        }

        Ok(search.into_best())
    }
}

/// Decoding steps for a batch: the longest caption minus one.
pub fn decode_steps(lengths: &[usize]) -> usize {
    lengths.iter().copied().max().unwrap_or(0).saturating_sub(1)
}

/// 1.0 where step `t` of row `i` satisfies t < lengths[i] - 1.
pub fn sequence_mask<B: Backend>(lengths: &[usize], steps: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut mask = Vec::with_capacity(lengths.len() * steps);
    for &len in lengths {
        let valid = len.saturating_sub(1);
        mask.extend((0..steps).map(|t| if t < valid { 1.0f32 } else { 0.0 }));
    }
    Tensor::from_data(TensorData::new(mask, [lengths.len(), steps]), device)
}

/// Cross entropy averaged over masked positions: Σ(nll · mask) / Σ mask.
pub fn sequence_loss<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch, steps, vocab] = logits.dims();
    let log_probs = log_softmax(logits.reshape([batch * steps, vocab]), 1);
    let picked = log_probs
        .gather(1, targets.reshape([batch * steps, 1]))
        .reshape([batch, steps]);

    let total = (picked.neg() * mask.clone()).sum();
    total / mask.sum().clamp_min(1e-12)
}

/// (correct, counted) greedy predictions over masked positions.
pub fn token_accuracy<B: Backend>(output: &CaptionOutput<B>) -> (f64, f64) {
    let [batch, steps, _] = output.logits.dims();
    let predicted = output.logits.clone().argmax(2).reshape([batch, steps]);
    let hits = predicted.equal(output.targets.clone()).float() * output.mask.clone();
    (
        hits.sum().into_scalar().elem::<f64>(),
        output.mask.clone().sum().into_scalar().elem::<f64>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn tiny_config() -> CaptionModelConfig {
        CaptionModelConfig::new(10, 32, 32)
            .with_embedding_dim(6)
            .with_rnn_size(8)
            .with_num_layers(2)
            .with_backbone_width(2)
    }

    #[test]
    fn test_decode_steps() {
        assert_eq!(decode_steps(&[4, 3, 6]), 5);
        assert_eq!(decode_steps(&[]), 0);
    }

    #[test]
    fn test_sequence_mask() {
        let device = Default::default();
        let mask: Vec<f32> = sequence_mask::<B>(&[4, 2], 3, &device).into_data().to_vec().unwrap();
        assert_eq!(mask, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([2, 3, 7], &device);
        let targets = Tensor::<B, 2, Int>::from_ints([[1, 2, 3], [4, 5, 0]], &device);
        let mask = sequence_mask::<B>(&[4, 3], 3, &device);

        let loss: f32 = sequence_loss(logits, targets, mask).into_scalar();
        assert!((loss - 7.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_padding_positions_do_not_contribute() {
        let device = Default::default();
        // Row 0 predicts its targets with certainty. Row 1's only
        // valid step does too, but its padded step is badly wrong.
        let mut values = vec![0.0f32; 2 * 2 * 3];
        let confident = |v: &mut Vec<f32>, row: usize, step: usize, token: usize| {
            v[(row * 2 + step) * 3 + token] = 50.0;
        };
        confident(&mut values, 0, 0, 1);
        confident(&mut values, 0, 1, 2);
        confident(&mut values, 1, 0, 2);
        confident(&mut values, 1, 1, 1);
        let logits = Tensor::<B, 3>::from_data(TensorData::new(values, [2, 2, 3]), &device);
        let targets = Tensor::<B, 2, Int>::from_ints([[1, 2], [2, 0]], &device);
        let mask = sequence_mask::<B>(&[3, 2], 2, &device);

        let loss: f32 = sequence_loss(logits, targets, mask).into_scalar();
        assert!(loss < 1e-4);
    }

    #[test]
    fn test_forward_shapes_and_loss() {
        let device = Default::default();
        let model = tiny_config().init::<B>(&device);
        let images = Tensor::<B, 4>::random([2, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        let captions = Tensor::<B, 2, Int>::from_ints([[2, 4, 5, 3, 0], [2, 6, 3, 0, 0]], &device);

        let (loss, output) = model.forward_loss(images, captions, &[4, 3], 0.2);

        assert_eq!(output.logits.dims(), [2, 3, 10]);
        assert_eq!(output.targets.dims(), [2, 3]);
        let loss: f32 = loss.into_scalar();
        assert!(loss.is_finite() && loss > 0.0);

        let (hits, counted) = token_accuracy(&output);
        assert_eq!(counted, 5.0);
        assert!(hits <= counted);
    }

    #[test]
    fn test_beam_search_respects_step_bound() {
        let device = Default::default();
        let model = tiny_config().init::<B>(&device);
        let image = Tensor::<B, 4>::random([1, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        let config = BeamSearchConfig { beam_width: 3, start_token: 2, end_token: 3, max_steps: 4 };

        let best = model.beam_search(image, &config).unwrap();

        assert!(best.tokens.len() <= 4);
        assert!(best.tokens.iter().all(|&t| (0..10).contains(&t) && t != 3));
        assert!(best.log_prob.is_finite());
    }

    #[test]
    fn test_width_one_beam_matches_greedy_replay() {
        let device = Default::default();
        let model = tiny_config().init::<B>(&device);
        let image = Tensor::<B, 4>::random([1, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        let config = BeamSearchConfig { beam_width: 1, start_token: 2, end_token: 3, max_steps: 6 };

        let best = model.beam_search(image.clone(), &config).unwrap();

        // Feed <start> + chosen tokens (+ <end>) back through the
        // teacher-forced path: every step's argmax is the next token
        let mut caption = vec![2i64];
        caption.extend(&best.tokens);
        if best.finished {
            caption.push(3);
        }
        let len = caption.len();
        let captions = Tensor::<B, 2, Int>::from_data(TensorData::new(caption.clone(), [1, len]), &device);

        let output = model.forward(image, captions, &[len], 0.0);
        let greedy: Vec<i64> = output
            .logits
            .argmax(2)
            .reshape([len - 1])
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();

        assert_eq!(greedy, caption[1..].to_vec());
    }
}
