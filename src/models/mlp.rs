//! Feed-forward neural network classifier.
//!
//! Fully connected hidden layers (tanh or ReLU) with a softmax output over
//! the classes seen in training, trained on standardized inputs with
//! mini-batch cross-entropy and L2 penalty `alpha`, using Adam or momentum
//! SGD. The adaptive schedule divides the step size by 5 whenever the
//! epoch loss stalls for two epochs.

use super::linalg::{softmax, Standardizer};
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MAX_EPOCHS: usize = 200;
const BATCH_SIZE: usize = 200;
const TOLERANCE: f64 = 1e-4;
const NO_CHANGE_EPOCHS: usize = 10;
const MOMENTUM: f64 = 0.9;
const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Tanh,
}

impl Activation {
    fn apply(self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Tanh => v.tanh(),
        }
    }

    /// Derivative expressed through the activation output
    fn derivative(self, out: f64) -> f64 {
        match self {
            Activation::Relu => {
                if out > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - out * out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    /// `weights[out][in]`
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl Layer {
    fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
        Self {
            weights: (0..fan_out)
                .map(|_| (0..fan_in).map(|_| rng.gen_range(-bound..bound)).collect())
                .collect(),
            bias: (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect(),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weights: self.weights.iter().map(|w| vec![0.0; w.len()]).collect(),
            bias: vec![0.0; self.bias.len()],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| w.iter().zip(input).map(|(a, x)| a * x).sum::<f64>() + b)
            .collect()
    }

    /// Every parameter with its gradient and optimizer slots
    fn params_mut<'a>(
        &'a mut self,
        grad: &'a Layer,
        m: &'a mut Layer,
        v: &'a mut Layer,
    ) -> impl Iterator<Item = (&'a mut f64, f64, &'a mut f64, &'a mut f64)> {
        let weights = self
            .weights
            .iter_mut()
            .flatten()
            .zip(grad.weights.iter().flatten())
            .zip(m.weights.iter_mut().flatten())
            .zip(v.weights.iter_mut().flatten());
        let bias = self
            .bias
            .iter_mut()
            .zip(grad.bias.iter())
            .zip(m.bias.iter_mut())
            .zip(v.bias.iter_mut());
        weights
            .chain(bias)
            .map(|(((p, g), m), v)| (p, *g, m, v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Solver {
    Adam,
    Sgd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultilayerPerceptron {
    scaler: Standardizer,
    activation: Activation,
    layers: Vec<Layer>,
    classes: Vec<usize>,
    n_classes: usize,
}

impl MultilayerPerceptron {
    /// Reads `hidden_layer_sizes` ([100]), `activation` (relu|tanh), `solver`
    /// (adam|sgd), `alpha` (1e-4), `learning_rate` (constant|adaptive) and
    /// `learning_rate_init` (1e-3).
    pub fn fit(data: &TrainingSet, params: &ParamSet, seed: u64) -> Result<Self, ModelError> {
        let hidden = params.layers_or("hidden_layer_sizes", &[100])?;
        let activation = match params.choice_or("activation", &["relu", "tanh"])? {
            "tanh" => Activation::Tanh,
            _ => Activation::Relu,
        };
        let solver = match params.choice_or("solver", &["adam", "sgd"])? {
            "sgd" => Solver::Sgd,
            _ => Solver::Adam,
        };
        let alpha = params.f64_or("alpha", 1e-4)?;
        let adaptive = params.choice_or("learning_rate", &["constant", "adaptive"])? == "adaptive";
        let mut step_size = params.f64_or("learning_rate_init", 1e-3)?;
        if alpha < 0.0 || step_size <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "alpha".to_string(),
                reason: "alpha must be >= 0 and learning_rate_init > 0".to_string(),
            });
        }

        let classes = data.require_classes(2)?;
        let mut class_index = vec![usize::MAX; data.n_classes];
        for (i, &class) in classes.iter().enumerate() {
            class_index[class] = i;
        }

        let scaler = Standardizer::fit(data.x);
        let x = scaler.transform_all(data.x);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut widths = vec![data.width()];
        widths.extend(&hidden);
        widths.push(classes.len());
        let mut model = Self {
            scaler,
            activation,
            layers: widths.windows(2).map(|w| Layer::glorot(w[0], w[1], &mut rng)).collect(),
            classes,
            n_classes: data.n_classes,
        };

        let mut first = model.layers.iter().map(Layer::zeros_like).collect::<Vec<_>>();
        let mut second = first.clone();
        let mut order: Vec<usize> = (0..x.len()).collect();
        let mut best_loss = f64::INFINITY;
        let mut stalled = 0usize;
        let mut updates = 0i32;

        for epoch in 0..MAX_EPOCHS {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(BATCH_SIZE) {
                let (grads, loss) = model.batch_gradients(&x, data.y, &class_index, batch, alpha);
                epoch_loss += loss * batch.len() as f64;
                updates += 1;
                for ((layer, grad), (m, v)) in model
                    .layers
                    .iter_mut()
                    .zip(&grads)
                    .zip(first.iter_mut().zip(second.iter_mut()))
                {
                    for (p, g, m, v) in layer.params_mut(grad, m, v) {
                        match solver {
                            Solver::Adam => {
                                *m = BETA1 * *m + (1.0 - BETA1) * g;
                                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                                let m_hat = *m / (1.0 - BETA1.powi(updates));
                                let v_hat = *v / (1.0 - BETA2.powi(updates));
                                *p -= step_size * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                            }
                            Solver::Sgd => {
                                *m = MOMENTUM * *m - step_size * g;
                                *p += *m;
                            }
                        }
                    }
                }
            }
            epoch_loss /= x.len() as f64;
            if !epoch_loss.is_finite() {
                return Err(ModelError::Numerical {
                    reason: format!("loss diverged at epoch {}", epoch),
                });
            }

            if epoch_loss > best_loss - TOLERANCE {
                stalled += 1;
            } else {
                stalled = 0;
            }
            best_loss = best_loss.min(epoch_loss);

            if adaptive {
                if stalled >= 2 {
                    step_size /= 5.0;
                    stalled = 0;
                    if step_size < 1e-6 {
                        break;
                    }
                }
            } else if stalled >= NO_CHANGE_EPOCHS {
                break;
            }
        }

        tracing::debug!(loss = best_loss, "mlp converged");
        Ok(model)
    }

    /// Activations of every layer, input first, softmax output last
    fn forward(&self, input: Vec<f64>) -> Vec<Vec<f64>> {
        let mut activations = vec![input];
        let last = self.layers.len() - 1;
        for (l, layer) in self.layers.iter().enumerate() {
            let mut out = layer.forward(&activations[l]);
            if l == last {
                softmax(&mut out);
            } else {
                for v in out.iter_mut() {
                    *v = self.activation.apply(*v);
                }
            }
            activations.push(out);
        }
        activations
    }

    /// Mean gradients over `batch` plus the batch loss
    fn batch_gradients(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        class_index: &[usize],
        batch: &[usize],
        alpha: f64,
    ) -> (Vec<Layer>, f64) {
        let mut grads: Vec<Layer> = self.layers.iter().map(Layer::zeros_like).collect();
        let scale = 1.0 / batch.len() as f64;
        let mut loss = 0.0;

        for &i in batch {
            let activations = self.forward(x[i].clone());
            let target = class_index[y[i]];
            let output = &activations[activations.len() - 1];
            loss -= output[target].max(1e-15).ln() * scale;

            let mut delta: Vec<f64> = output.clone();
            delta[target] -= 1.0;
            for l in (0..self.layers.len()).rev() {
                let input = &activations[l];
                for (o, d) in delta.iter().enumerate() {
                    for (g, a) in grads[l].weights[o].iter_mut().zip(input) {
                        *g += d * a * scale;
                    }
                    grads[l].bias[o] += d * scale;
                }
                if l > 0 {
                    delta = (0..input.len())
                        .map(|j| {
                            let back: f64 = self.layers[l]
                                .weights
                                .iter()
                                .zip(&delta)
                                .map(|(w, d)| w[j] * d)
                                .sum();
                            back * self.activation.derivative(input[j])
                        })
                        .collect();
                }
            }
        }

        let mut penalty = 0.0;
        for (grad, layer) in grads.iter_mut().zip(&self.layers) {
            for (gw, w) in grad.weights.iter_mut().zip(&layer.weights) {
                for (g, v) in gw.iter_mut().zip(w) {
                    *g += alpha * v * scale;
                    penalty += v * v;
                }
            }
        }
        (grads, loss + 0.5 * alpha * penalty * scale)
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.scaler.width(), row)?;
        let activations = self.forward(self.scaler.transform(row));
        let output = &activations[activations.len() - 1];
        let mut proba = vec![0.0; self.n_classes];
        for (p, &class) in output.iter().zip(&self.classes) {
            proba[class] = *p;
        }
        Ok(proba)
    }
}
