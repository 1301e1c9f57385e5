//! Dispatcher and bus properties across assembled device worlds.

use emulator_core::{DeviceKind, World};
use proptest::prelude::*;

#[test]
fn every_address_of_a_registered_device_dispatches_to_it() {
    let mut world = World::new();
    let mem = world.add_memory(0x4000, 0xFFF).unwrap();

    for addr in (0x4000_u32..=0x4FFF).step_by(0x101) {
        assert_eq!(world.dispatch(addr), mem);
    }
    assert_eq!(world.dispatch(0x4FFF), mem);
    assert_ne!(world.dispatch(0x3FFC), mem);
    assert_ne!(world.dispatch(0x5000), mem);
}

#[test]
fn overlapping_registration_resolves_to_the_later_device() {
    let mut world = World::new();
    let first = world.add_memory(0x0, 0x1FFF).unwrap();
    let second = world.add_memory(0x1000, 0x1FFF).unwrap();

    for addr in (0x1000_u32..=0x2FFF).step_by(0x400) {
        assert_eq!(world.dispatch(addr), second);
    }
    assert_eq!(world.dispatch(0x0FFF), first);
}

#[test]
fn rom_file_bytes_read_as_little_endian_words_at_any_base() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.bin");
    std::fs::write(&path, [0x01, 0x02, 0x03, 0x04]).unwrap();

    let mut world = World::new();
    world.add_rom(0x0070_0000, &path).unwrap();

    assert_eq!(world.get_word(0x0070_0000), 0x0403_0201);
    assert_eq!(world.get_byte(0x0070_0000), 0x01);
    assert_eq!(world.get_byte(0x0070_0003), 0x04);
}

#[test]
fn shadowed_rom_overrides_memory_contents_but_keeps_the_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boot.bin");
    std::fs::write(&path, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]).unwrap();

    let mut world = World::new();
    let mem = world.add_memory(0, 0xFFF).unwrap();
    world.set_word(0x10, 0xFFFF_FFFF);
    let rom = world.add_rom(0x10, &path).unwrap();

    assert_eq!(rom, mem);
    assert!(matches!(world.device(rom), DeviceKind::Memory(_)));
    assert_eq!(world.get_word(0x10), 0x4433_2211);
    assert_eq!(world.get_word(0x14), 0x8877_6655);
}

#[test]
fn word_access_straddling_rom_and_memory_combines_portions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.bin");
    std::fs::write(&path, [0xAA; 16]).unwrap();

    let mut world = World::new();
    world.add_memory(0, 0xF).unwrap();
    world.add_rom(0x10, &path).unwrap();
    world.set_word(0xC, 0xBBBB_BBBB);

    // Window 0xE..0x11: two memory bytes, two ROM bytes.
    assert_eq!(world.get_word(0xE), 0xAAAA_BBBB);

    // Writing the same window only lands in the writable half.
    world.set_word(0xE, 0x1122_3344);
    assert_eq!(world.get_byte(0xE), 0x44);
    assert_eq!(world.get_byte(0xF), 0x33);
    assert_eq!(world.get_byte(0x10), 0xAA, "ROM byte unchanged");
    assert_eq!(world.get_byte(0x11), 0xAA, "ROM byte unchanged");
}

proptest! {
    #[test]
    fn bus_word_round_trips_inside_one_memory(off in 0_u32..0xFFC, word in any::<u32>()) {
        let mut world = World::new();
        world.add_memory(0x8000, 0xFFF).unwrap();
        world.set_word(0x8000 + off, word);
        prop_assert_eq!(world.get_word(0x8000 + off), word);
    }

    #[test]
    fn bus_word_round_trips_across_adjacent_memories(tail in 1_u32..4, word in any::<u32>()) {
        let mut world = World::new();
        world.add_memory(0x0, 0xFFF).unwrap();
        world.add_memory(0x1000, 0xFFF).unwrap();
        // The window starts `tail` bytes before the second device.
        let addr = 0x1000 - tail;
        world.set_word(addr, word);
        prop_assert_eq!(world.get_word(addr), word);
    }

    #[test]
    fn unmapped_reads_are_zero_extended(addr in any::<u32>()) {
        let world = World::new();
        prop_assert_eq!(world.get_word(addr), 0);
        prop_assert_eq!(world.get_byte(addr), 0);
    }
}
