// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

use crate::cli::args::InfoArgs;
use crate::error::Result;
use crate::store::load_file;
use crate::{info, section};

/// Print statistics for a skeleton dataset file.
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let videos = load_file(&args.dataset)?;

    section!("Dataset: {}", args.dataset);
    info!("Videos: {}", videos.len());
    if videos.is_empty() {
        return Ok(());
    }

    let frame_counts: Vec<usize> = videos.iter().map(|v| v.frame_count).collect();
    let total: usize = frame_counts.iter().sum();
    let min = frame_counts.iter().min().unwrap_or(&0);
    let max = frame_counts.iter().max().unwrap_or(&0);
    info!("Frames: {total} total, {min}..{max} per video");

    let first = &videos[0];
    info!(
        "Part shapes (first video): pose {:?}, face {:?}, hands {:?} / {:?}",
        first.pose.dim(),
        first.face.dim(),
        first.left_hand.dim(),
        first.right_hand.dim()
    );
    Ok(())
}
