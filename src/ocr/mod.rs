pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{TesseractReader, TextDetection, TextReader, parse_tsv_output};
pub use extract::{DetectionGroup, LabelExtractor, LabelFields, LabelReading};
pub use preprocess::label_crop;
pub use setup::{ensure_tessdata, find_tesseract_executable};
