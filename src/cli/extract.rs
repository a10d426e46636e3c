// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::args::ExtractArgs;
use crate::embedder::OnnxEmbedder;
use crate::error::{PipelineError, Result};
use crate::knn::save_class;
use crate::pipeline::Pipeline;
use crate::store::load_file;
use crate::{info, success, verbose, warn, PipelineConfig};

/// Extract KNN feature rows from every video in a skeleton dataset.
///
/// Each video contributes `samples` randomized, augmented embeddings; the
/// rows are appended to the class file under the database root.
pub fn run_extract(args: &ExtractArgs) -> Result<()> {
    let videos = load_file(&args.dataset)?;
    verbose!("Loaded {} videos from {}", videos.len(), args.dataset);

    let embedder = OnnxEmbedder::load(&args.model)?;
    let config = PipelineConfig::default();
    let precision = config.knn_precision;
    let mut pipeline = Pipeline::new(config)?.with_embedder(Box::new(embedder));

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut rows = Vec::new();
    for (i, video) in videos.iter().enumerate() {
        let mut kept = 0;
        for _ in 0..args.samples {
            match pipeline.extract_training_features(video, &mut rng) {
                Ok(feature) => {
                    rows.push(feature);
                    kept += 1;
                }
                Err(e) => {
                    warn!("Video {i}: {e}, skipped.");
                    break;
                }
            }
        }
        if kept > 0 {
            verbose!("Video {i}: {kept} samples.");
        }
    }

    if rows.is_empty() {
        return Err(PipelineError::DatabaseError(
            "no features extracted, nothing written".to_string(),
        ));
    }

    let path = save_class(&args.output, &args.label, &rows, precision)?;
    success!(
        "Appended {} feature rows for '{}' to {}",
        rows.len(),
        args.label,
        path.display()
    );
    info!("Database root: {}", args.output);
    Ok(())
}
