//! Embedding worker thread pool.
//!
//! Runs ONNX inference on dedicated threads to avoid blocking the async
//! runtime. Workers share one session behind a mutex.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::{ArrayView2, ArrayView3, Axis};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tokenizers::Tokenizer;

use crate::error::EmbeddingError;
use crate::telemetry::EMBEDDING_QUEUE_DEPTH;
use crate::Result;

struct EmbeddingRequest {
    texts: Vec<String>,
    response_tx: tokio::sync::oneshot::Sender<Result<Vec<Vec<f32>>>>,
}

/// Worker pool for embedding generation.
pub struct EmbeddingWorker {
    request_tx: Sender<EmbeddingRequest>,
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl EmbeddingWorker {
    /// Start `num_workers` threads sharing `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(session: Session, tokenizer: Arc<Tokenizer>, num_workers: usize) -> Result<Self> {
        let (request_tx, request_rx): (Sender<EmbeddingRequest>, Receiver<EmbeddingRequest>) =
            bounded(100);

        let session = Arc::new(Mutex::new(session));
        let mut workers = Vec::with_capacity(num_workers);

        for i in 0..num_workers {
            let session = Arc::clone(&session);
            let tokenizer = Arc::clone(&tokenizer);
            let rx = request_rx.clone();

            let handle = std::thread::Builder::new()
                .name(format!("embedding-worker-{i}"))
                .spawn(move || worker_loop(&session, &tokenizer, &rx))
                .map_err(|e| EmbeddingError::WorkerPool(format!("failed to spawn worker: {e}")))?;

            workers.push(handle);
        }

        tracing::info!(num_workers, "Embedding worker pool started");

        Ok(Self {
            request_tx,
            _workers: workers,
        })
    }

    /// Embed texts on the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is gone or inference fails.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();

        enqueue(&self.request_tx, EmbeddingRequest { texts, response_tx })?;

        response_rx
            .await
            .map_err(|_| EmbeddingError::WorkerPool("worker dropped response".to_string()))?
    }
}

/// Queue a request, counting it before a worker can dequeue it.
fn enqueue(request_tx: &Sender<EmbeddingRequest>, request: EmbeddingRequest) -> Result<()> {
    EMBEDDING_QUEUE_DEPTH.inc();
    request_tx.send(request).map_err(|_| {
        EMBEDDING_QUEUE_DEPTH.dec();
        EmbeddingError::WorkerPool("worker pool closed".to_string()).into()
    })
}

fn worker_loop(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    request_rx: &Receiver<EmbeddingRequest>,
) {
    while let Ok(request) = request_rx.recv() {
        EMBEDDING_QUEUE_DEPTH.dec();
        let result = run_inference(session, tokenizer, &request.texts);
        // The caller may have given up; nothing to do then.
        let _ = request.response_tx.send(result);
    }
    tracing::debug!("Embedding worker shutting down");
}

/// Tokenize, run the model and mean-pool its last hidden state.
fn run_inference(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to tokenize: {e}")))?;

    let batch_size = encodings.len();
    let seq_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut input_ids = vec![0i64; batch_size * seq_len];
    let mut attention_mask = vec![0i64; batch_size * seq_len];
    let mut token_type_ids = vec![0i64; batch_size * seq_len];

    for (i, encoding) in encodings.iter().enumerate() {
        let row = i * seq_len;
        for (j, ((id, mask), kind)) in encoding
            .get_ids()
            .iter()
            .zip(encoding.get_attention_mask())
            .zip(encoding.get_type_ids())
            .enumerate()
        {
            input_ids[row + j] = i64::from(*id);
            attention_mask[row + j] = i64::from(*mask);
            token_type_ids[row + j] = i64::from(*kind);
        }
    }

    let tensor = |data: Vec<i64>, name: &str| {
        Tensor::from_array(([batch_size, seq_len], data))
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create {name}: {e}")))
    };
    let ids_tensor = tensor(input_ids, "input_ids")?;
    let mask_tensor = tensor(attention_mask.clone(), "attention_mask")?;
    let types_tensor = tensor(token_type_ids, "token_type_ids")?;

    let mut session = session.lock();
    let outputs = session
        .run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => types_tensor,
        ])
        .map_err(|e| EmbeddingError::Runtime(format!("inference failed: {e}")))?;

    let (_, hidden) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbeddingError::Runtime(format!("failed to read output: {e}")))?;

    let hidden_size = hidden.len() / (batch_size * seq_len);
    let hidden = ArrayView3::from_shape((batch_size, seq_len, hidden_size), hidden)
        .map_err(|e| EmbeddingError::Runtime(format!("unexpected output shape: {e}")))?;
    let mask = ArrayView2::from_shape((batch_size, seq_len), &attention_mask)
        .map_err(|e| EmbeddingError::Runtime(format!("unexpected mask shape: {e}")))?;

    Ok(mean_pool(hidden, mask))
}

/// Mean of the unmasked token vectors, L2 normalized, per batch row.
fn mean_pool(hidden: ArrayView3<'_, f32>, mask: ArrayView2<'_, i64>) -> Vec<Vec<f32>> {
    hidden
        .axis_iter(Axis(0))
        .zip(mask.axis_iter(Axis(0)))
        .map(|(tokens, row_mask)| {
            let mut sum = vec![0.0f32; tokens.ncols()];
            let mut count = 0.0f32;

            for (token, &m) in tokens.axis_iter(Axis(0)).zip(row_mask.iter()) {
                if m == 1 {
                    for (s, v) in sum.iter_mut().zip(token.iter()) {
                        *s += v;
                    }
                    count += 1.0;
                }
            }

            if count > 0.0 {
                for s in &mut sum {
                    *s /= count;
                }
            }

            let norm = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for s in &mut sum {
                    *s /= norm;
                }
            }
            sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn request() -> EmbeddingRequest {
        let (response_tx, _) = tokio::sync::oneshot::channel();
        EmbeddingRequest {
            texts: vec!["text".to_string()],
            response_tx,
        }
    }

    #[test]
    fn test_enqueue_tracks_queue_depth() {
        let before = EMBEDDING_QUEUE_DEPTH.get();

        let (tx, rx) = bounded(1);
        enqueue(&tx, request()).unwrap();
        assert_eq!(EMBEDDING_QUEUE_DEPTH.get(), before + 1);
        rx.recv().unwrap();
        EMBEDDING_QUEUE_DEPTH.dec();

        drop(rx);
        let err = enqueue(&tx, request()).unwrap_err();
        assert!(err.to_string().contains("worker pool closed"));
        assert_eq!(EMBEDDING_QUEUE_DEPTH.get(), before);
    }

    #[test]
    fn test_mean_pool_respects_mask() {
        // Row 0 uses tokens 0 and 1, row 1 only token 0.
        let hidden = Array3::from_shape_vec(
            (2, 3, 3),
            vec![
                1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, //
                0.0, 3.0, 4.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
            ],
        )
        .unwrap();
        let mask = Array2::from_shape_vec((2, 3), vec![1, 1, 0, 1, 0, 0]).unwrap();

        let pooled = mean_pool(hidden.view(), mask.view());

        assert_eq!(pooled.len(), 2);
        let norm: f32 = pooled[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        // Mean [2.5, 3.5, 4.5], normalized: direction preserved.
        assert!((pooled[0][1] / pooled[0][0] - 3.5 / 2.5).abs() < 1e-5);
        assert!((pooled[1][0]).abs() < 1e-6);
        assert!((pooled[1][1] - 0.6).abs() < 1e-6);
        assert!((pooled[1][2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_empty_mask() {
        let hidden = Array3::from_shape_vec((1, 1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let mask = Array2::from_shape_vec((1, 1), vec![0]).unwrap();

        let pooled = mean_pool(hidden.view(), mask.view());
        assert!(pooled[0].iter().all(|&x| x == 0.0));
    }
}
