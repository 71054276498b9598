pub mod dicom;
pub mod preview;

pub use dicom::DicomService;
