pub mod detection;
pub mod history;
pub mod overlay;
pub mod taxonomy;

pub use detection::{CanonicalDetection, DetectResponse, RawDetection, normalize, primary_index};
pub use history::{
    AnalysisEntry, AnalysisRecordRaw, DefectEntry, DefectRecord, HistoryEntry,
    MalformedHistoryRecord, reconcile,
};
pub use overlay::{FrameSize, OverlayBox, project};
pub use taxonomy::{DefectClass, display_class};
