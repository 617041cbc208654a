// ============================================================
// Layer 5 — Image Encoder (VGG16 backbone)
// ============================================================
// The VGG16 convolutional stack with its classifier removed:
//
//   block 1: 2 × conv3x3(w)    + maxpool 2x2
//   block 2: 2 × conv3x3(2w)   + maxpool 2x2
//   block 3: 3 × conv3x3(4w)   + maxpool 2x2
//   block 4: 3 × conv3x3(8w)   + maxpool 2x2
//   block 5: 3 × conv3x3(8w)   + maxpool 2x2
//
// with w = 64 for the published network. An H×W image becomes an
// (H/32)×(W/32) grid of 8w-channel features, which is used two ways:
//
//   memory      [batch, H/32·W/32, 8w]  attention memory
//   projection  [batch, rnn_size]       Linear(flatten(grid)),
//                                       seeds every decoder layer
//
// Blocks 1–3 (the first 7 convolutions) are frozen by default:
// their pretrained filters are generic edge/texture detectors.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation::relu, module::max_pool2d},
};

/// Convolutions per VGG16 block; every block ends in a 2x2 max pool.
pub const VGG16_BLOCKS: [usize; 5] = [2, 2, 3, 3, 3];

const BLOCK_WIDTHS: [usize; 5] = [1, 2, 4, 8, 8];

/// Total downsampling of the backbone (one halving per block)
pub const BACKBONE_STRIDE: usize = 1 << VGG16_BLOCKS.len();

/// Number of convolutions in the backbone
pub const VGG16_CONVS: usize = 13;

#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub rnn_size:     usize,
    pub image_height: usize,
    pub image_width:  usize,
    #[config(default = 64)]
    pub base_width:   usize,
    #[config(default = 3)]
    pub channels:     usize,
}

impl EncoderConfig {
    /// Channel width of the final feature grid
    pub fn feature_channels(&self) -> usize {
        self.base_width * BLOCK_WIDTHS[BLOCK_WIDTHS.len() - 1]
    }

    /// (rows, cols) of the final feature grid
    pub fn grid(&self) -> (usize, usize) {
        (self.image_height / BACKBONE_STRIDE, self.image_width / BACKBONE_STRIDE)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageEncoder<B> {
        let mut convs = Vec::with_capacity(VGG16_CONVS);
        let mut in_channels = self.channels;
        for (block, &count) in VGG16_BLOCKS.iter().enumerate() {
            let out_channels = self.base_width * BLOCK_WIDTHS[block];
            for _ in 0..count {
                convs.push(
                    Conv2dConfig::new([in_channels, out_channels], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .init(device),
                );
                in_channels = out_channels;
            }
        }

        let (rows, cols) = self.grid();
        let state_projection =
            LinearConfig::new(self.feature_channels() * rows * cols, self.rnn_size).init(device);

        ImageEncoder {
            backbone: VggBackbone { convs },
            state_projection,
        }
    }
}

/// The 13 VGG16 convolutions. Pooling and ReLU carry no parameters
/// and are applied functionally, so the record holds exactly the
/// convolution weights and biases in network order.
#[derive(Module, Debug)]
pub struct VggBackbone<B: Backend> {
    pub convs: Vec<Conv2d<B>>,
}

impl<B: Backend> VggBackbone<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = images;
        let mut convs = self.convs.iter();
        for &count in VGG16_BLOCKS.iter() {
            for conv in convs.by_ref().take(count) {
                x = relu(conv.forward(x));
            }
            x = max_pool2d(x, [2, 2], [2, 2], [0, 0], [1, 1]);
        }
        x
    }

    /// Stop gradients for the first `frozen` convolutions.
    pub fn freeze(self, frozen: usize) -> Self {
        let convs = self
            .convs
            .into_iter()
            .enumerate()
            .map(|(i, conv)| if i < frozen { conv.no_grad() } else { conv })
            .collect();
        Self { convs }
    }
}

/// Encoder output consumed by the decoder.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// [batch, slots, channels]
    pub memory:     Tensor<B, 3>,
    /// [batch, rnn_size]
    pub projection: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct ImageEncoder<B: Backend> {
    pub backbone:         VggBackbone<B>,
    pub state_projection: Linear<B>,
}

impl<B: Backend> ImageEncoder<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> EncoderOutput<B> {
        let features = self.backbone.forward(images);
        let [batch, channels, rows, cols] = features.dims();

        let memory = features
            .clone()
            .reshape([batch, channels, rows * cols])
            .swap_dims(1, 2);
        let projection = self
            .state_projection
            .forward(features.reshape([batch, channels * rows * cols]));

        EncoderOutput { memory, projection }
    }

    pub fn freeze(self, frozen: usize) -> Self {
        Self { backbone: self.backbone.freeze(frozen), ..self }
    }
}
