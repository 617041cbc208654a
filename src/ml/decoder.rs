// ============================================================
// Layer 5 — Attention Decoder
// ============================================================
// A stack of LSTM cells wrapped in Luong attention. One step:
//
//   x        = [embed(token) ; previous attention]
//   h_1..h_n = LSTM stack(x)
//   context  = attend(h_n, encoder memory)
//   attn     = W_attn [h_n ; context]        (no bias)
//   logits   = W_out attn + b
//
// `attn` is fed back as part of the next step's input. The same
// `step` drives both training (forward_scheduled) and inference
// (beam search), so the two paths always share parameters.

use burn::{
    nn::{Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::Distribution,
};

use crate::ml::{
    attention::{tile_rows, AttentionMemory, LuongAttention, LuongAttentionConfig},
    cell::{CellState, LstmCell, LstmCellConfig},
};

#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub vocab_size:    usize,
    /// Channel width of the encoder memory
    pub memory_size:   usize,
    #[config(default = 256)]
    pub embedding_dim: usize,
    #[config(default = 256)]
    pub rnn_size:      usize,
    #[config(default = 2)]
    pub num_layers:    usize,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionDecoder<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_dim)
            .with_initializer(Initializer::Uniform { min: -1.0, max: 1.0 })
            .init(device);

        let cells = (0..self.num_layers)
            .map(|layer| {
                let input_size = if layer == 0 {
                    self.embedding_dim + self.rnn_size
                } else {
                    self.rnn_size
                };
                LstmCellConfig::new(input_size, self.rnn_size).init(device)
            })
            .collect();

        AttentionDecoder {
            embedding,
            cells,
            attention: LuongAttentionConfig::new(self.memory_size, self.rnn_size).init(device),
            attention_layer: LinearConfig::new(self.rnn_size + self.memory_size, self.rnn_size)
                .with_bias(false)
                .init(device),
            output_layer: LinearConfig::new(self.rnn_size, self.vocab_size).init(device),
            embedding_dim: self.embedding_dim,
            rnn_size: self.rnn_size,
            vocab_size: self.vocab_size,
        }
    }
}

/// Everything the decoder carries from one step to the next.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub layers:    Vec<CellState<B>>,
    /// Previous attention output, [batch, rnn_size]
    pub attention: Tensor<B, 2>,
}

impl<B: Backend> DecoderState<B> {
    /// Keep only the rows named by `indices` (beam reordering).
    pub fn select(self, indices: Tensor<B, 1, Int>) -> Self {
        let layers = self
            .layers
            .into_iter()
            .map(|s| CellState {
                cell:   s.cell.select(0, indices.clone()),
                hidden: s.hidden.select(0, indices.clone()),
            })
            .collect();
        Self { layers, attention: self.attention.select(0, indices) }
    }

    pub fn tile(self, times: usize) -> Self {
        let layers = self
            .layers
            .into_iter()
            .map(|s| CellState {
                cell:   tile_rows(s.cell, times),
                hidden: tile_rows(s.hidden, times),
            })
            .collect();
        Self { layers, attention: tile_rows(self.attention, times) }
    }
}

#[derive(Module, Debug)]
pub struct AttentionDecoder<B: Backend> {
    pub embedding:       Embedding<B>,
    pub cells:           Vec<LstmCell<B>>,
    pub attention:       LuongAttention<B>,
    pub attention_layer: Linear<B>,
    pub output_layer:    Linear<B>,
    pub embedding_dim:   usize,
    pub rnn_size:        usize,
    pub vocab_size:      usize,
}

impl<B: Backend> AttentionDecoder<B> {
    pub fn memory(&self, features: Tensor<B, 3>) -> AttentionMemory<B> {
        self.attention.memory(features)
    }

    /// Seed state: the encoder projection becomes both cell and hidden
    /// state of every layer; the attention feedback starts at zero.
    pub fn initial_state(&self, projection: Tensor<B, 2>) -> DecoderState<B> {
        let [batch, _] = projection.dims();
        let device = projection.device();
        let layers = self
            .cells
            .iter()
            .map(|_| CellState { cell: projection.clone(), hidden: projection.clone() })
            .collect();
        DecoderState { layers, attention: Tensor::zeros([batch, self.rnn_size], &device) }
    }

    /// One decoding step for a batch of input tokens. Returns the
    /// vocabulary logits [batch, vocab] and the next state.
    pub fn step(
        &self,
        tokens: Tensor<B, 1, Int>,
        state:  DecoderState<B>,
        memory: &AttentionMemory<B>,
    ) -> (Tensor<B, 2>, DecoderState<B>) {
        let [batch] = tokens.dims();
        let embedded = self
            .embedding
            .forward(tokens.reshape([batch, 1]))
            .reshape([batch, self.embedding_dim]);

        let mut input = Tensor::cat(vec![embedded, state.attention], 1);
        let mut layers = Vec::with_capacity(self.cells.len());
        for (cell, previous) in self.cells.iter().zip(state.layers) {
            let next = cell.forward(input, previous);
            input = next.hidden.clone();
            layers.push(next);
        }

        let alignments = self.attention.align(input.clone(), memory);
        let context = self.attention.context(alignments, memory);
        let attention = self.attention_layer.forward(Tensor::cat(vec![input, context], 1));
        let logits = self.output_layer.forward(attention.clone());

        (logits, DecoderState { layers, attention })
    }

    /// Run over a whole shifted caption batch ([batch, steps]) with
    /// scheduled sampling and return logits [batch, steps, vocab].
    ///
    /// From the second step on, each row's ground-truth token is
    /// replaced, with probability `sampling_probability`, by a token
    /// sampled from that row's previous logits.
    pub fn forward_scheduled(
        &self,
        inputs: Tensor<B, 2, Int>,
        state:  DecoderState<B>,
        memory: &AttentionMemory<B>,
        sampling_probability: f64,
    ) -> Tensor<B, 3> {
        let [batch, steps] = inputs.dims();
        let mut state = state;
        let mut outputs = Vec::with_capacity(steps);
        let mut previous: Option<Tensor<B, 2>> = None;

        for t in 0..steps {
            let truth = inputs.clone().slice([0..batch, t..t + 1]).reshape([batch]);
            let tokens = match previous.take() {
                Some(logits) if sampling_probability > 0.0 => {
                    scheduled_tokens(truth, logits, sampling_probability)
                }
                _ => truth,
            };

            let (logits, next) = self.step(tokens, state, memory);
            outputs.push(logits.clone().reshape([batch, 1, self.vocab_size]));
            previous = Some(logits);
            state = next;
        }

        Tensor::cat(outputs, 1)
    }
}

/// Mix ground truth with tokens sampled from `logits` (Gumbel-max).
fn scheduled_tokens<B: Backend>(
    truth:  Tensor<B, 1, Int>,
    logits: Tensor<B, 2>,
    sampling_probability: f64,
) -> Tensor<B, 1, Int> {
    let [batch, vocab] = logits.dims();
    let device = logits.device();

    let uniform = Tensor::<B, 2>::random([batch, vocab], Distribution::Uniform(1e-10, 1.0), &device);
    let gumbel = uniform.log().neg().log().neg();
    let sampled = (logits.detach() + gumbel).argmax(1).reshape([batch]);

    let coin = Tensor::<B, 1>::random([batch], Distribution::Uniform(0.0, 1.0), &device)
        .lower_elem(sampling_probability);
    truth.mask_where(coin, sampled)
}
