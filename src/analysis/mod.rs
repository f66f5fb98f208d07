pub mod classification;
pub mod knee_detection;
pub mod outlier_removal;
pub mod result_assembly;
pub mod semantic_matching;
pub mod syntactic_matching;
