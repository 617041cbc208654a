// ============================================================
// Layer 5 — Global-Norm Gradient Clipping
// ============================================================
// Rescales all gradients jointly so their combined L2 norm does
// not exceed `max_norm`:
//
//   global = sqrt(Σ_p ||g_p||²)
//   g_p   *= max_norm / max(global, max_norm)
//
// Burn's built-in clipping works per parameter, which changes
// the direction of the overall update. Here the module is walked
// twice with a ModuleVisitor: once to measure, once to scale.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm over every gradient that belongs to `module`.
pub fn global_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Clip `grads` to `max_norm`. Returns the clipped gradients and the
/// norm measured before clipping.
pub fn clip_by_global_norm<B, M>(
    module:   &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_norm::<B, M>(module, &grads);
    if norm > max_norm && norm.is_finite() && max_norm > 0.0 {
        let mut visitor = Rescale { grads: &mut grads, scale: max_norm / norm };
        module.visit(&mut visitor);
    }
    (grads, norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type B = Autodiff<NdArray>;

    fn grads_for(model: &Linear<B>, scale: f32) -> GradientsParams {
        let device = Default::default();
        let x = Tensor::<B, 2>::ones([4, 3], &device);
        let loss = model.forward(x).sum().mul_scalar(scale);
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_large_gradients_are_clipped_to_bound() {
        let device = Default::default();
        let model = LinearConfig::new(3, 2).init::<B>(&device);
        let grads = grads_for(&model, 1000.0);

        let before = global_norm::<B, _>(&model, &grads);
        assert!(before > 5.0);

        let (clipped, reported) = clip_by_global_norm::<B, _>(&model, grads, 5.0);
        assert!((reported - before).abs() < 1e-6 * before);

        let after = global_norm::<B, _>(&model, &clipped);
        assert!((after - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_small_gradients_are_untouched() {
        let device = Default::default();
        let model = LinearConfig::new(3, 2).init::<B>(&device);
        let grads = grads_for(&model, 1e-3);

        let before = global_norm::<B, _>(&model, &grads);
        let (clipped, _) = clip_by_global_norm::<B, _>(&model, grads, 5.0);
        let after = global_norm::<B, _>(&model, &clipped);

        assert!(before < 5.0);
        assert!((after - before).abs() < 1e-9);
    }

    #[test]
    fn test_norm_matches_hand_computation() {
        let device = Default::default();
        let model = LinearConfig::new(3, 2).init::<B>(&device);
        // d(sum(xW + b))/dW = 4 for each of 6 weights, /db = 4 for each of 2 biases
        let grads = grads_for(&model, 1.0);
        let expected = (8.0f64 * 16.0).sqrt();
        assert!((global_norm::<B, _>(&model, &grads) - expected).abs() < 1e-4);
    }
}
