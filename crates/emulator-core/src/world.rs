//! The device world: registry, dispatch table, and memory bus.
//!
//! A [`World`] owns every registered device and the dispatch table mapping
//! addresses onto them. It is created with a zero device covering the whole
//! address space; user-configured memories, ROMs, and peripherals are
//! registered afterwards and override the fallback (and each other, later
//! registrations winning) at 4-byte granularity.
//!
//! The world also tracks the largest array-backed device and the largest
//! memory device, which the CPU interpreter uses for its fast fetch and
//! store paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::device::{ArrayDevice, Device, DeviceKind, ReadOnly, ZeroDevice};
use crate::dispatch::{DeviceId, DeviceTable};
use crate::peripherals::{StdioDevice, TicksDevice};

/// Largest allowed memory device limit.
pub const MEMORY_LIMIT_MAX: u32 = 0xFFFF_FFFB;

/// Largest usable ROM image size in bytes.
const ROM_SIZE_MAX: u64 = 0xFFFF_FFFC;

/// Errors raised while building the device world.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Memory limit exceeds [`MEMORY_LIMIT_MAX`].
    #[error("memory limit {limit:#x} is too large")]
    MemoryTooLarge {
        /// The rejected limit.
        limit: u32,
    },
    /// The range `[base, base + limit]` wraps past the end of the address
    /// space.
    #[error("region {base:#x}+{limit:#x} overflows the address space")]
    RangeOverflow {
        /// Configured base address.
        base: u32,
        /// Configured limit.
        limit: u32,
    },
    /// A ROM file could not be read.
    #[error("cannot read ROM {}: {source}", path.display())]
    RomIo {
        /// Path of the ROM file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A ROM file contains no bytes.
    #[error("ROM {} is empty", path.display())]
    RomEmpty {
        /// Path of the ROM file.
        path: PathBuf,
    },
}

/// Cached placement of a hot device for the interpreter's fast paths.
#[derive(Debug, Clone, Copy)]
pub struct HotRegion {
    /// Device identity, used to reach the raw backing buffer.
    pub id: DeviceId,
    /// First address managed by the device.
    pub base: u32,
    /// Offset of the last managed byte.
    pub limit: u32,
}

/// The assembled machine: all devices plus the dispatcher over them.
#[derive(Debug)]
pub struct World {
    devices: Vec<DeviceKind>,
    table: DeviceTable,
    largest_readable: Option<DeviceId>,
    largest_memory: Option<DeviceId>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world whose entire address space is covered by a zero
    /// device, so no access is ever unmapped.
    #[must_use]
    pub fn new() -> Self {
        let fallback = DeviceId(0);
        Self {
            devices: vec![DeviceKind::Zero(ZeroDevice::new(0, u32::MAX))],
            table: DeviceTable::new(fallback),
            largest_readable: None,
            largest_memory: None,
        }
    }

    fn register(&mut self, kind: DeviceKind) -> DeviceId {
        let id = DeviceId(self.devices.len() as u32);
        let base = kind.base();
        let limit = kind.limit();
        self.devices.push(kind);
        self.table.install(base, limit, id);
        tracing::debug!(base, limit, id = id.index(), "registered device");
        id
    }

    fn check_range(base: u32, limit: u32) -> Result<(), SetupError> {
        base.checked_add(limit)
            .map(|_| ())
            .ok_or(SetupError::RangeOverflow { base, limit })
    }

    /// Registers a zero-initialized memory device over `[base, base+limit]`.
    pub fn add_memory(&mut self, base: u32, limit: u32) -> Result<DeviceId, SetupError> {
        if limit > MEMORY_LIMIT_MAX {
            return Err(SetupError::MemoryTooLarge { limit });
        }
        Self::check_range(base, limit)?;
        let id = self.register(DeviceKind::Memory(ArrayDevice::zeroed(base, limit)));
        self.note_readable(id, limit);
        if self
            .largest_memory
            .is_none_or(|cur| limit > self.devices[cur.index()].limit())
        {
            self.largest_memory = Some(id);
        }
        Ok(id)
    }

    /// Loads a ROM image and maps it at `base`.
    ///
    /// When the image's whole range already dispatches to one single memory
    /// device, the image is shadowed into that memory's buffer and no new
    /// device is created. Returns the id of the device serving the image.
    pub fn add_rom(&mut self, base: u32, path: &Path) -> Result<DeviceId, SetupError> {
        let mut image = fs::read(path).map_err(|source| SetupError::RomIo {
            path: path.to_path_buf(),
            source,
        })?;
        if image.is_empty() {
            return Err(SetupError::RomEmpty {
                path: path.to_path_buf(),
            });
        }
        image.truncate(ROM_SIZE_MAX as usize);
        let limit = (image.len() - 1) as u32;
        Self::check_range(base, limit)?;

        let start = self.table.lookup(base);
        let end = self.table.lookup(base + limit);
        if start == end {
            if let Some(memory) = self.devices[start.index()].as_memory_mut() {
                let off = base.wrapping_sub(memory.base());
                memory.load_image(off, &image);
                tracing::debug!(
                    base,
                    limit,
                    into = start.index(),
                    "shadowed ROM into existing memory"
                );
                return Ok(start);
            }
        }

        let id = self.register(DeviceKind::Rom(ReadOnly::new(ArrayDevice::from_bytes(
            base, &image,
        ))));
        self.note_readable(id, limit);
        Ok(id)
    }

    /// Registers the console device at `base`, attached to the process
    /// stdin/stdout.
    pub fn add_stdio(&mut self, base: u32) -> Result<DeviceId, SetupError> {
        Self::check_range(base, 7)?;
        Ok(self.register(DeviceKind::Stdio(StdioDevice::new(base))))
    }

    /// Registers a console device over caller-provided streams (tests).
    pub fn add_stdio_device(&mut self, dev: StdioDevice) -> Result<DeviceId, SetupError> {
        Self::check_range(dev.base(), dev.limit())?;
        Ok(self.register(DeviceKind::Stdio(dev)))
    }

    /// Registers the tick counter device at `base`.
    pub fn add_ticks(&mut self, base: u32) -> Result<DeviceId, SetupError> {
        Self::check_range(base, 3)?;
        Ok(self.register(DeviceKind::Ticks(TicksDevice::new(base))))
    }

    fn note_readable(&mut self, id: DeviceId, limit: u32) {
        if self
            .largest_readable
            .is_none_or(|cur| limit > self.devices[cur.index()].limit())
        {
            self.largest_readable = Some(id);
        }
    }

    /// The registered device with the given id.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> &DeviceKind {
        &self.devices[id.index()]
    }

    /// Mutable access to a registered device.
    #[must_use]
    pub fn device_mut(&mut self, id: DeviceId) -> &mut DeviceKind {
        &mut self.devices[id.index()]
    }

    /// The device responsible for `addr`.
    #[must_use]
    pub fn dispatch(&self, addr: u32) -> DeviceId {
        self.table.lookup(addr)
    }

    /// Placement of the array device (memory or ROM) with the greatest
    /// limit, if any.
    #[must_use]
    pub fn largest_readable(&self) -> Option<HotRegion> {
        self.largest_readable.map(|id| self.hot_region(id))
    }

    /// Placement of the memory device with the greatest limit, if any.
    #[must_use]
    pub fn largest_memory(&self) -> Option<HotRegion> {
        self.largest_memory.map(|id| self.hot_region(id))
    }

    fn hot_region(&self, id: DeviceId) -> HotRegion {
        let dev = &self.devices[id.index()];
        HotRegion {
            id,
            base: dev.base(),
            limit: dev.limit(),
        }
    }

    /// Reads the byte at `addr` through the dispatcher.
    #[must_use]
    pub fn get_byte(&self, addr: u32) -> u8 {
        let dev = self.device(self.dispatch(addr));
        dev.get_byte(addr.wrapping_sub(dev.base()))
    }

    /// Writes the byte at `addr` through the dispatcher.
    pub fn set_byte(&mut self, addr: u32, byte: u8) {
        let id = self.dispatch(addr);
        let dev = self.device_mut(id);
        let off = addr.wrapping_sub(dev.base());
        dev.set_byte(off, byte);
    }

    /// Reads the word at `addr` through the dispatcher.
    ///
    /// An unaligned access whose window straddles two devices reads each
    /// device's portion at its own offset and combines the results; the high
    /// device sees a wrapped (negative) offset, which the per-device word
    /// masking resolves to its leading bytes.
    #[must_use]
    pub fn get_word(&self, addr: u32) -> u32 {
        let first = self.dispatch(addr);
        let dev = self.device(first);
        let mut word = dev.get_word(addr.wrapping_sub(dev.base()));
        if addr & 3 != 0 {
            let second = self.dispatch(addr.wrapping_add(3));
            if second != first {
                let dev = self.device(second);
                word |= dev.get_word(addr.wrapping_sub(dev.base()));
            }
        }
        word
    }

    /// Writes the word at `addr` through the dispatcher, splitting it across
    /// both devices when the window straddles a boundary.
    pub fn set_word(&mut self, addr: u32, word: u32) {
        let first = self.dispatch(addr);
        {
            let dev = self.device_mut(first);
            let off = addr.wrapping_sub(dev.base());
            dev.set_word(off, word);
        }
        if addr & 3 != 0 {
            let second = self.dispatch(addr.wrapping_add(3));
            if second != first {
                let dev = self.device_mut(second);
                let off = addr.wrapping_sub(dev.base());
                dev.set_word(off, word);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SetupError, World, MEMORY_LIMIT_MAX};
    use crate::device::DeviceKind;
    use std::io::Write;

    #[test]
    fn fresh_world_reads_zero_everywhere() {
        let world = World::new();
        assert_eq!(world.get_byte(0), 0);
        assert_eq!(world.get_word(0xDEAD_BEEF), 0);
        assert_eq!(world.get_word(u32::MAX), 0);
    }

    #[test]
    fn writes_to_unmapped_addresses_are_discarded() {
        let mut world = World::new();
        world.set_word(0x100, 0xFFFF_FFFF);
        world.set_byte(0x200, 0xAA);
        assert_eq!(world.get_word(0x100), 0);
        assert_eq!(world.get_byte(0x200), 0);
    }

    #[test]
    fn memory_word_round_trip_through_the_bus() {
        let mut world = World::new();
        world.add_memory(0x1000, 0xFFF).unwrap();

        world.set_word(0x1004, 0xCAFE_F00D);
        assert_eq!(world.get_word(0x1004), 0xCAFE_F00D);
        assert_eq!(world.get_byte(0x1004), 0x0D);

        // Unaligned inside one device.
        world.set_word(0x1101, 0x0403_0201);
        assert_eq!(world.get_word(0x1101), 0x0403_0201);
        assert_eq!(world.get_byte(0x1101), 0x01);
        assert_eq!(world.get_byte(0x1104), 0x04);
    }

    #[test]
    fn straddling_word_splits_across_adjacent_devices() {
        let mut world = World::new();
        world.add_memory(0x0, 0xF).unwrap();
        world.add_memory(0x10, 0xF).unwrap();

        world.set_word(0xE, 0x4433_2211);
        // Low half landed at the end of the first device.
        assert_eq!(world.get_byte(0xE), 0x11);
        assert_eq!(world.get_byte(0xF), 0x22);
        // High half landed at the start of the second device.
        assert_eq!(world.get_byte(0x10), 0x33);
        assert_eq!(world.get_byte(0x11), 0x44);
        // Reading back reconstructs the word.
        assert_eq!(world.get_word(0xE), 0x4433_2211);
    }

    #[test]
    fn straddling_word_with_unmapped_high_half_zero_extends() {
        let mut world = World::new();
        world.add_memory(0x0, 0xF).unwrap();

        world.set_word(0xE, 0x4433_2211);
        // The high bytes went to the zero device and vanished.
        assert_eq!(world.get_word(0xE), 0x0000_2211);
    }

    #[test]
    fn later_memory_overrides_earlier_in_overlap() {
        let mut world = World::new();
        let first = world.add_memory(0x0, 0xFFF).unwrap();
        let second = world.add_memory(0x800, 0xFFF).unwrap();

        assert_eq!(world.dispatch(0x7FF), first);
        assert_eq!(world.dispatch(0x800), second);
        assert_eq!(world.dispatch(0xFFF), second);
    }

    #[test]
    fn oversized_memory_is_rejected() {
        let mut world = World::new();
        assert!(matches!(
            world.add_memory(0, MEMORY_LIMIT_MAX + 1),
            Err(SetupError::MemoryTooLarge { .. })
        ));
    }

    #[test]
    fn wrapping_region_is_rejected() {
        let mut world = World::new();
        assert!(matches!(
            world.add_memory(0xFFFF_0000, 0x1_0000),
            Err(SetupError::RangeOverflow { .. })
        ));
        assert!(matches!(
            world.add_ticks(0xFFFF_FFFE),
            Err(SetupError::RangeOverflow { .. })
        ));
    }

    #[test]
    fn largest_devices_are_tracked_by_limit() {
        let mut world = World::new();
        assert!(world.largest_readable().is_none());
        assert!(world.largest_memory().is_none());

        let small = world.add_memory(0x1000, 0xFF).unwrap();
        let big = world.add_memory(0x10_0000, 0xFFFF).unwrap();
        world.add_memory(0x20_0000, 0xFF).unwrap();

        assert_eq!(world.largest_memory().unwrap().id, big);
        assert_eq!(world.largest_readable().unwrap().id, big);
        assert_eq!(world.largest_readable().unwrap().base, 0x10_0000);
        let _ = small;
    }

    #[test]
    fn rom_shadows_into_a_covering_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        drop(file);

        let mut world = World::new();
        let mem = world.add_memory(0x1000, 0xFFF).unwrap();
        let rom = world.add_rom(0x1100, &path).unwrap();

        assert_eq!(rom, mem, "image shadowed, no new device");
        assert_eq!(world.get_word(0x1100), 0x0403_0201);
        // Shadowed bytes stay writable: this is still memory.
        world.set_word(0x1100, 0xFFFF_FFFF);
        assert_eq!(world.get_word(0x1100), 0xFFFF_FFFF);
    }

    #[test]
    fn rom_outside_memory_becomes_a_read_only_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, [0xEF, 0xBE, 0xAD, 0xDE, 0x55]).unwrap();

        let mut world = World::new();
        let rom = world.add_rom(0x8000, &path).unwrap();

        assert!(matches!(world.device(rom), DeviceKind::Rom(_)));
        assert_eq!(world.get_word(0x8000), 0xDEAD_BEEF);
        assert_eq!(world.get_byte(0x8004), 0x55);

        world.set_word(0x8000, 0);
        assert_eq!(world.get_word(0x8000), 0xDEAD_BEEF);

        // The ROM is the largest readable device so far.
        assert_eq!(world.largest_readable().unwrap().id, rom);
        assert!(world.largest_memory().is_none());
    }

    #[test]
    fn missing_rom_file_reports_io_error() {
        let mut world = World::new();
        let err = world
            .add_rom(0, std::path::Path::new("/nonexistent/rom.bin"))
            .unwrap_err();
        assert!(matches!(err, SetupError::RomIo { .. }));
    }

    #[test]
    fn empty_rom_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, []).unwrap();

        let mut world = World::new();
        assert!(matches!(
            world.add_rom(0, &path),
            Err(SetupError::RomEmpty { .. })
        ));
    }

    #[test]
    fn rom_spanning_two_devices_is_not_shadowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, [0xAA; 0x20]).unwrap();

        let mut world = World::new();
        world.add_memory(0x1000, 0xF).unwrap();
        // Image range [0xFF8, 0x1017] starts on the zero device.
        let rom = world.add_rom(0xFF8, &path).unwrap();

        assert!(matches!(world.device(rom), DeviceKind::Rom(_)));
        assert_eq!(world.get_byte(0xFF8), 0xAA);
    }
}
