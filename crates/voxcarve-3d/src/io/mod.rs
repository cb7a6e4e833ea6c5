/// OFF mesh reader and writer module.
pub mod off;
