pub mod general;
pub mod rectangular;

pub use general::GeneralPurposeDecoder;
pub use rectangular::FastRectangularDecoder;
