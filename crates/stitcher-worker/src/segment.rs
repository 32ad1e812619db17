// Video segments and their deterministic ordering

use std::path::PathBuf;

use stitcher_core::VideoItem;

/// One input clip as it moves through the pipeline
#[derive(Debug, Clone)]
pub struct VideoSegment {
    pub source_url: String,
    /// Caller-supplied ordering key
    pub sequence: i32,
    /// Position in the submitted list; breaks sequence ties
    pub input_index: usize,
    /// Set by acquisition
    pub local_path: PathBuf,
    /// Set by normalization
    pub normalized_path: Option<PathBuf>,
}

impl VideoSegment {
    pub fn from_items(items: &[VideoItem]) -> Vec<Self> {
        items
            .iter()
            .enumerate()
            .map(|(input_index, item)| Self {
                source_url: item.url.clone(),
                sequence: item.sequence,
                input_index,
                local_path: PathBuf::new(),
                normalized_path: None,
            })
            .collect()
    }
}

/// Order segments by ascending `sequence`; ties keep original submission
/// order. The sort is stable, so equal keys never swap.
pub fn order_segments(segments: &mut [VideoSegment]) {
    segments.sort_by_key(|s| s.sequence);
}
