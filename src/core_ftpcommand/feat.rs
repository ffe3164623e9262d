use crate::constants::FEATURES;
use crate::helpers::{reply_multiline, ControlWriter};

pub async fn handle_feat_command(writer: ControlWriter) -> Result<(), std::io::Error> {
    reply_multiline(&writer, 211, "Features:", FEATURES, "End").await
}
