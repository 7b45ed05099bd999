//! Attribute data bridge.
//!
//! Two handle-keyed tables sit between the GATT server callbacks and the script layer:
//!
//! - the read direction holds the values the script publishes, served to the peer by the
//!   read callback and by notifications,
//! - the write direction holds the most recent value the peer wrote to each handle.
use heapless::{FnvIndexMap, Vec};

use crate::att::{AttErrorCode, TransactionMode};
use crate::config::{ATTRIBUTE_TABLE_SIZE, ATTRIBUTE_VALUE_MAX};
use crate::Error;

/// The attribute handle reserved as "no attribute".
pub const ATT_HANDLE_NONE: u16 = 0x0000;

/// A stored attribute value.
pub type AttributeValue = Vec<u8, ATTRIBUTE_VALUE_MAX>;

/// Attribute values keyed by handle, for one direction of the bridge.
pub struct AttributeTable {
    values: FnvIndexMap<u16, AttributeValue, ATTRIBUTE_TABLE_SIZE>,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTable {
    pub fn new() -> Self {
        Self {
            values: FnvIndexMap::new(),
        }
    }

    /// Store `data` for `handle`, replacing any previous value.
    pub fn set(&mut self, handle: u16, data: &[u8]) -> Result<(), Error> {
        if handle == ATT_HANDLE_NONE {
            return Err(Error::InvalidValue);
        }
        let value = AttributeValue::from_slice(data).map_err(|_| Error::InsufficientSpace)?;
        self.values
            .insert(handle, value)
            .map(|_| ())
            .map_err(|_| Error::InsufficientSpace)
    }

    pub fn get(&self, handle: u16) -> Option<&[u8]> {
        self.values.get(&handle).map(|v| v.as_slice())
    }

    pub fn remove(&mut self, handle: u16) -> Option<AttributeValue> {
        self.values.remove(&handle)
    }

    /// Whether a value for `handle` can be stored without evicting another handle.
    pub fn has_room_for(&self, handle: u16) -> bool {
        self.values.contains_key(&handle) || self.values.len() < ATTRIBUTE_TABLE_SIZE
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Blob read of the value stored for `handle`.
    ///
    /// Copies the bytes starting at `offset` into `buffer`, as many as fit. An offset at or
    /// past the end of the value yields zero bytes. Call with increasing offsets to page
    /// through a value larger than one ATT MTU.
    pub fn read(&self, handle: u16, offset: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        let value = self.values.get(&handle).ok_or(Error::HandleNotFound)?;
        if offset >= value.len() {
            return Ok(0);
        }
        let len = buffer.len().min(value.len() - offset);
        buffer[..len].copy_from_slice(&value[offset..offset + len]);
        Ok(len)
    }

    /// Write `data` at `offset` into the value for `handle`.
    ///
    /// Offset 0 replaces the value. A non-zero offset keeps the first `offset` bytes of the
    /// current value and replaces the rest with `data`.
    pub fn splice(&mut self, handle: u16, offset: usize, data: &[u8]) -> Result<(), AttErrorCode> {
        if offset == 0 {
            return self.set(handle, data).map_err(|e| match e {
                Error::InvalidValue => AttErrorCode::INVALID_HANDLE,
                _ => AttErrorCode::INSUFFICIENT_RESOURCES,
            });
        }
        let value = self.values.get_mut(&handle).ok_or(AttErrorCode::INVALID_OFFSET)?;
        splice_into(value, offset, data)
    }
}

fn splice_into(value: &mut AttributeValue, offset: usize, data: &[u8]) -> Result<(), AttErrorCode> {
    if offset > value.len() {
        return Err(AttErrorCode::INVALID_OFFSET);
    }
    if offset + data.len() > ATTRIBUTE_VALUE_MAX {
        return Err(AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH);
    }
    value.truncate(offset);
    value
        .extend_from_slice(data)
        .map_err(|_| AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH)
}

struct PreparedWrite {
    handle: u16,
    value: AttributeValue,
}

/// Both directions of the bridge, plus the staging area for prepared writes.
///
/// A stored write is also published in the read direction, so the peer reads back what it
/// wrote until the script publishes something else.
pub struct AttributeBridge {
    read: AttributeTable,
    written: AttributeTable,
    prepared: Option<PreparedWrite>,
}

impl Default for AttributeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeBridge {
    pub fn new() -> Self {
        Self {
            read: AttributeTable::new(),
            written: AttributeTable::new(),
            prepared: None,
        }
    }

    /// Values served to the peer.
    pub fn read_table(&self) -> &AttributeTable {
        &self.read
    }

    pub fn read_table_mut(&mut self) -> &mut AttributeTable {
        &mut self.read
    }

    /// Values written by the peer.
    pub fn written_table(&self) -> &AttributeTable {
        &self.written
    }

    pub fn written_table_mut(&mut self) -> &mut AttributeTable {
        &mut self.written
    }

    /// A write is only stored when it can also be published for read-back.
    fn ensure_room(&self, handle: u16) -> Result<(), AttErrorCode> {
        if self.written.has_room_for(handle) && self.read.has_room_for(handle) {
            Ok(())
        } else {
            warn!("[att] attribute table full, write to {} refused", handle);
            Err(AttErrorCode::INSUFFICIENT_RESOURCES)
        }
    }

    fn publish_written(&mut self, handle: u16) -> Result<(), AttErrorCode> {
        match self.written.get(handle) {
            Some(value) => self
                .read
                .set(handle, value)
                .map_err(|_| AttErrorCode::INSUFFICIENT_RESOURCES),
            None => Ok(()),
        }
    }

    /// Serve a read request from the host stack.
    ///
    /// Without a buffer, returns the full length of the value (the host stack uses this to
    /// size its response). A handle with no value reads as empty.
    pub fn read_blob(&self, handle: u16, offset: usize, buffer: Option<&mut [u8]>) -> usize {
        match buffer {
            None => self.read.get(handle).map(|v| v.len()).unwrap_or(0),
            Some(buffer) => match self.read.read(handle, offset, buffer) {
                Ok(len) => len,
                Err(_) => {
                    trace!("[att] read of unknown handle {}", handle);
                    0
                }
            },
        }
    }

    /// Apply a write from the host stack.
    ///
    /// Returns the handle whose stored value changed, if any.
    pub fn write(
        &mut self,
        handle: u16,
        mode: TransactionMode,
        offset: usize,
        data: &[u8],
    ) -> Result<Option<u16>, AttErrorCode> {
        match mode {
            TransactionMode::None | TransactionMode::Active if handle == ATT_HANDLE_NONE => {
                Err(AttErrorCode::INVALID_HANDLE)
            }
            TransactionMode::None | TransactionMode::Active if data.is_empty() => {
                Err(AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH)
            }
            TransactionMode::None => {
                self.ensure_room(handle)?;
                self.written.splice(handle, offset, data)?;
                self.publish_written(handle)?;
                Ok(Some(handle))
            }
            TransactionMode::Active => {
                match &mut self.prepared {
                    Some(prepared) if prepared.handle == handle => {
                        splice_into(&mut prepared.value, offset, data)?;
                    }
                    Some(prepared) => {
                        warn!(
                            "[att] prepared write for {} while {} is still pending",
                            handle, prepared.handle
                        );
                        return Err(AttErrorCode::PREPARE_QUEUE_FULL);
                    }
                    None => {
                        let mut value = AttributeValue::new();
                        splice_into(&mut value, offset, data)?;
                        self.prepared = Some(PreparedWrite { handle, value });
                    }
                }
                Ok(None)
            }
            TransactionMode::Execute => match self.prepared.take() {
                Some(prepared) => {
                    self.ensure_room(prepared.handle)?;
                    self.written
                        .set(prepared.handle, &prepared.value)
                        .map_err(|_| AttErrorCode::INSUFFICIENT_RESOURCES)?;
                    self.publish_written(prepared.handle)?;
                    Ok(Some(prepared.handle))
                }
                None => Ok(None),
            },
            TransactionMode::Cancel => {
                self.prepared = None;
                Ok(None)
            }
        }
    }
}
