pub mod template_util;
pub mod timestamp_codec;
