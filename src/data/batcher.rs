// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec<CaptionItem> becomes
// one CaptionBatch of tensors on the target device.
//
//   images   [N, 3, H, W]   stacked CHW pixel buffers
//   captions [N, L]         right-padded with <pad>, L = longest
//                           caption in this batch
//   lengths  N values       true token counts, kept on the host
//                           because the loss mask is built there

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::CaptionItem;

/// A batch of captioned images ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Normalised pixels, shape: [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Caption ids, shape: [batch_size, longest caption in batch]
    /// Rows end in <end> followed by <pad>
    pub captions: Tensor<B, 2, Int>,

    /// Unpadded caption lengths, <start> and <end> included
    pub lengths: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct CaptionBatcher<B: Backend> {
    device: B::Device,
    pad_id: u32,
    height: usize,
    width:  usize,
}

impl<B: Backend> CaptionBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32, height: usize, width: usize) -> Self {
        Self { device, pad_id, height, width }
    }
}

impl<B: Backend> Batcher<CaptionItem, CaptionBatch<B>> for CaptionBatcher<B> {
    fn batch(&self, items: Vec<CaptionItem>) -> CaptionBatch<B> {
        let batch_size = items.len();
        let lengths: Vec<usize> = items.iter().map(|i| i.token_ids.len()).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let mut tokens = Vec::with_capacity(batch_size * max_len);
        for item in &items {
            tokens.extend(item.token_ids.iter().map(|&t| t as i64));
            tokens.extend(std::iter::repeat(self.pad_id as i64).take(max_len - item.token_ids.len()));
        }

        let pixels: Vec<f32> = items.into_iter().flat_map(|i| i.pixels).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 3, self.height, self.width]),
            &self.device,
        );
        let captions = Tensor::<B, 2, Int>::from_data(
            TensorData::new(tokens, [batch_size, max_len]),
            &self.device,
        );

        CaptionBatch { images, captions, lengths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_pads_captions_and_keeps_lengths() {
        let device = Default::default();
        let batcher = CaptionBatcher::<NdArray>::new(device, 0, 2, 2);
        let items = vec![
            CaptionItem { pixels: vec![0.5; 12], token_ids: vec![2, 5, 6, 3] },
            CaptionItem { pixels: vec![-0.5; 12], token_ids: vec![2, 7, 3] },
        ];

        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.captions.dims(), [2, 4]);
        assert_eq!(batch.lengths, vec![4, 3]);

        let tokens: Vec<i64> = batch.captions.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(tokens, vec![2, 5, 6, 3, 2, 7, 3, 0]);

        let pixels: Vec<f32> = batch.images.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(pixels[0], 0.5);
        assert_eq!(pixels[12], -0.5);
    }
}
