//! Frame decoder
//!
//! The Decoder owns the layout database and the per-kind decoders. It routes each
//! tokenized frame, by its numeric ID, to the decoder of its [`MessageKind`].

use crate::config::BmsConfig;
use crate::messages::bms::{BmsDecoder, BMS_MESSAGE_ID};
use crate::messages::{motor, MessageKind};
use crate::signals::{DatabaseStats, LayoutDatabase, MessageLayout};
use crate::types::{DecodedFrame, RawFrame, Result, TelemetryError};
use std::path::Path;

/// Routes frames to the BMS and motor controller decoders
pub struct Decoder {
    /// Message layouts: built-in motor controller tables plus loaded DBC files
    layouts: LayoutDatabase,
    bms: BmsDecoder,
}

impl Decoder {
    /// Create a decoder with the built-in motor controller layouts
    pub fn new() -> Self {
        Self::with_bms_config(&BmsConfig::default())
    }

    /// Create a decoder with custom BMS settings
    pub fn with_bms_config(config: &BmsConfig) -> Self {
        let mut layouts = LayoutDatabase::new();
        for layout in motor::builtin_layouts() {
            layouts.add_message(layout);
        }

        Self {
            layouts,
            bms: BmsDecoder::new(config),
        }
    }

    /// Load a DBC file and add its layouts to the database
    ///
    /// # Example
    /// ```no_run
    /// use can_telemetry::Decoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = Decoder::new();
    /// decoder.add_dbc(Path::new("dbc/bms.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        self.add_layouts(messages);

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Parse DBC text and add its layouts to the database
    pub fn add_dbc_str(&mut self, dbc: &str, source: &str) -> Result<()> {
        let messages = crate::signals::dbc::parse_dbc_str(dbc, source)?;
        self.add_layouts(messages);
        Ok(())
    }

    fn add_layouts(&mut self, messages: Vec<MessageLayout>) {
        for message in messages {
            if message.id == BMS_MESSAGE_ID {
                log::debug!(
                    "BMS layout '{}' from {} (sent by {})",
                    message.name,
                    message.source,
                    message.sender.as_deref().unwrap_or("unknown node")
                );
            }
            self.layouts.add_message(message);
        }
    }

    /// Whether a layout for the BMS message has been loaded
    pub fn has_bms_layout(&self) -> bool {
        self.layouts.get_message(BMS_MESSAGE_ID).is_some()
    }

    /// Transmitting node named by the loaded BMS layout
    pub fn bms_sender(&self) -> Option<&str> {
        self.layouts
            .get_message(BMS_MESSAGE_ID)
            .and_then(|layout| layout.sender.as_deref())
    }

    /// Decode one frame
    ///
    /// Fails with `UnknownMessageId` for frames this bridge does not decode and
    /// with `SignalOutOfRange` when a motor controller payload length matches no
    /// known variant.
    pub fn decode(&mut self, frame: &RawFrame) -> Result<DecodedFrame> {
        let kind = MessageKind::from_id(frame.id).ok_or(TelemetryError::UnknownMessageId(frame.id))?;

        let readings = match kind {
            MessageKind::Bms => {
                let layout = self
                    .layouts
                    .get_message(BMS_MESSAGE_ID)
                    .ok_or(TelemetryError::UnknownMessageId(frame.id))?;
                self.bms.decode(layout, &frame.payload)
            }
            _ => motor::decode_pdo(kind, self.layouts.get_messages(frame.id), &frame.payload)?,
        };

        log::trace!("Decoded {} readings from {} (ID 0x{:03X})", readings.len(), kind, frame.id);

        Ok(DecodedFrame {
            timestamp: frame.timestamp,
            id: frame.id,
            kind,
            readings,
        })
    }

    /// The BMS decoder and its current history
    pub fn bms(&self) -> &BmsDecoder {
        &self.bms
    }

    /// Get statistics about the layout database
    pub fn database_stats(&self) -> DatabaseStats {
        self.layouts.stats()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
