// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

use crate::cli::args::ClassifyArgs;
use crate::embedder::OnnxEmbedder;
use crate::error::Result;
use crate::knn::KnnDatabase;
use crate::labels::LabelRegistry;
use crate::pipeline::Pipeline;
use crate::store::load_file;
use crate::{info, verbose, warn, PipelineConfig};

/// Classify every video in a skeleton dataset against a KNN database.
pub fn run_classify(args: &ClassifyArgs) -> Result<()> {
    let videos = load_file(&args.dataset)?;
    verbose!("Loaded {} videos from {}", videos.len(), args.dataset);

    let database = KnnDatabase::load_dir(&args.database)?;
    let registry = LabelRegistry::new(database.classes().iter().map(ToString::to_string))?;
    verbose!(
        "Loaded {} feature rows across {} classes from {}",
        database.len(),
        registry.len(),
        args.database
    );
    verbose!("Classes: {}", registry.labels().join(", "));

    let embedder = OnnxEmbedder::load(&args.model)?;
    let config = PipelineConfig::default().with_knn_k(args.k);
    let mut pipeline = Pipeline::new(config)?
        .with_embedder(Box::new(embedder))
        .with_database(database);

    let mut matched = 0;
    for (i, video) in videos.into_iter().enumerate() {
        match pipeline.classify(video) {
            Ok(Some(label)) => {
                matched += 1;
                info!("Video {i}: {label}");
            }
            Ok(None) => {
                info!("Video {i}: no result");
            }
            Err(e) => {
                warn!("Video {i}: {e}, skipped.");
            }
        }
    }
    verbose!("{matched} videos classified.");
    Ok(())
}
