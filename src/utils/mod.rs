pub mod pos_tagger;
pub mod similarity;
