pub mod arithmetic;
pub mod dark;
pub mod peaks;
pub mod pipeline;
pub mod serialization;

pub use arithmetic::{ArithmeticError, ArithmeticOp, apply_scalar, average, combine};
pub use dark::{BadPixelRun, DarkCorrection, DarkCorrectionError, correct_dark, correct_dark_detailed};
pub use peaks::{PeakDetectionError, assign_peaks, detect_peaks};
pub use pipeline::{
    BaselineRemoval, BaselineSummary, ProcessingReport, derivative_spectrum, process_frames,
    process_spectrum, remove_baseline, smooth_spectrum,
};
pub use serialization::{
    SerializationError, SpectrumFormat, load_dark_frame, load_spectrum, save_dark_frame,
    save_spectrum, spectrum_from_csv, spectrum_from_json, spectrum_to_csv, spectrum_to_json,
    write_text_artifact,
};
