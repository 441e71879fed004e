//! Candle BERT sequence classifier

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

use super::{SentimentModel, StarPrediction};
use crate::classify::{Backend, ClassifyError};

const NUM_CLASSES: usize = 5;

fn model_err(e: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::Model(e.to_string())
}

/// 5-star sentiment checkpoint loaded from a local directory
///
/// Expects `config.json`, `tokenizer.json` and `model.safetensors`.
pub struct CandleSentimentModel {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleSentimentModel {
    pub fn load(dir: &Path, use_cpu: bool, max_length: usize) -> Result<Self, ClassifyError> {
        let weights = dir.join("model.safetensors");
        if !weights.exists() {
            return Err(ClassifyError::Unavailable(
                Backend::Bert,
                format!("no model.safetensors in {}", dir.display()),
            ));
        }

        let device = if use_cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available(0).map_err(model_err)?
        };

        let config_str = std::fs::read_to_string(dir.join("config.json"))
            .map_err(|e| model_err(format!("failed to read config.json: {}", e)))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| model_err(format!("failed to parse config.json: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| model_err(format!("failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(model_err)?;

        // SAFETY: the weights file is not modified while mapped
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(model_err)?;

        let bert = BertModel::load(vb.pp("bert"), &config).map_err(model_err)?;
        let pooler = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            vb.pp("bert").pp("pooler").pp("dense"),
        )
        .map_err(model_err)?;
        let classifier =
            candle_nn::linear(config.hidden_size, NUM_CLASSES, vb.pp("classifier")).map_err(model_err)?;

        tracing::info!(model_dir = %dir.display(), "Loaded BERT sentiment model");

        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            device,
        })
    }

    fn batch_tensors(&self, texts: &[String]) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(candle_core::Error::msg)?;

        let batch_size = texts.len();
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut ids = Vec::with_capacity(batch_size * max_len);
        let mut mask = Vec::with_capacity(batch_size * max_len);
        for encoding in &encodings {
            let padding = max_len - encoding.get_ids().len();
            ids.extend_from_slice(encoding.get_ids());
            ids.extend(std::iter::repeat(0).take(padding));
            mask.extend_from_slice(encoding.get_attention_mask());
            mask.extend(std::iter::repeat(0).take(padding));
        }

        let ids = Tensor::new(ids.as_slice(), &self.device)?.reshape((batch_size, max_len))?;
        let mask = Tensor::new(mask.as_slice(), &self.device)?.reshape((batch_size, max_len))?;
        let token_types = Tensor::zeros((batch_size, max_len), DType::U32, &self.device)?;
        Ok((ids, mask, token_types))
    }

    fn forward(&self, texts: &[String]) -> candle_core::Result<Vec<StarPrediction>> {
        let (ids, mask, token_types) = self.batch_tensors(texts)?;

        let sequence = self.bert.forward(&ids, &token_types, Some(&mask))?;
        let cls = sequence.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        let probabilities = candle_nn::ops::softmax(&logits, 1)?.to_vec2::<f32>()?;

        Ok(probabilities
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map(|(stars, &probability)| StarPrediction { stars, probability })
                    .unwrap_or(StarPrediction {
                        stars: 2,
                        probability: 0.0,
                    })
            })
            .collect())
    }
}

impl SentimentModel for CandleSentimentModel {
    fn predict(&self, texts: &[String]) -> Result<Vec<StarPrediction>, ClassifyError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.forward(texts).map_err(model_err)
    }
}
