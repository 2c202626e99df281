//! Unit tests for bus locking around read-modify-write

use crate::common::{MockError, MockI2c, Operation, create_device};
use core::cell::RefCell;
use i2c_register::{
    Error, Field, I2cDevice, RWBit, RWBits, RefCellBus, RegisterAddress, RegisterBus,
    SharedBusError, Transaction,
};

const CONFIG: u8 = 0x1A;

#[test]
fn test_unlocked_interleaving_loses_a_write() {
    let (mut device, bus) = create_device();
    bus.set_register(u16::from(CONFIG), 0x00);

    // Two accessors read the same byte before either writes it back,
    // each in its own lock scope
    let read = |device: &mut I2cDevice<MockI2c>| {
        let mut byte = [0u8];
        let mut guard = device.lock().unwrap();
        guard.write(&[CONFIG], true).unwrap();
        guard.read_into(&mut byte).unwrap();
        byte[0]
    };
    let write = |device: &mut I2cDevice<MockI2c>, value: u8| {
        let mut guard = device.lock().unwrap();
        guard.write(&[CONFIG, value], false).unwrap();
    };

    let seen_by_a = read(&mut device);
    let seen_by_b = read(&mut device);
    write(&mut device, seen_by_a | 0x01);
    write(&mut device, seen_by_b | 0x80);

    // Bit 0 from accessor A was overwritten
    assert_eq!(bus.register(u16::from(CONFIG)), 0x80);
}

#[test]
fn test_locked_read_modify_write_keeps_both() {
    let (device, bus) = create_device();
    let device = RefCell::new(device);

    let mut a = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(CONFIG), 0).unwrap();
    let mut b = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(CONFIG), 7).unwrap();
    let mut c = RWBits::new(
        RefCellBus::new(&device),
        RegisterAddress::new(CONFIG),
        Field::unsigned(3, 3),
    )
    .unwrap();

    a.write(true).unwrap();
    b.write(true).unwrap();
    c.write(0b101).unwrap();

    assert_eq!(bus.register(u16::from(CONFIG)), 0b1010_1001);
    assert!(a.read().unwrap());
    assert!(b.read().unwrap());
    assert_eq!(c.read().unwrap(), 0b101);
}

#[test]
fn test_held_lock_rejects_other_accessors() {
    let (device, bus) = create_device();
    let device = RefCell::new(device);
    let mut holder = RefCellBus::new(&device);

    let mut flag = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(CONFIG), 2).unwrap();

    {
        let _guard = holder.lock().unwrap();
        assert_eq!(flag.write(true), Err(Error::Bus(SharedBusError::Busy)));
        assert_eq!(flag.read(), Err(Error::Bus(SharedBusError::Busy)));
    }
    assert!(bus.operations().is_empty());

    // Released when the guard dropped
    flag.write(true).unwrap();
    assert_eq!(bus.register(u16::from(CONFIG)), 0x04);
}

#[test]
fn test_lock_released_on_error() {
    let (device, bus) = create_device();
    let device = RefCell::new(device);

    let mut a = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(CONFIG), 0).unwrap();
    let mut b = RWBit::new(RefCellBus::new(&device), RegisterAddress::new(CONFIG), 1).unwrap();

    bus.fail_next_read();
    assert_eq!(
        a.write(true),
        Err(Error::Bus(SharedBusError::Bus(MockError::Communication)))
    );

    b.write(true).unwrap();
    assert_eq!(bus.register(u16::from(CONFIG)), 0x02);
}

#[test]
fn test_shared_lock_discards_unfinished_hold() {
    let (device, bus) = create_device();
    bus.set_register(0x20, 0x5A);
    let device = RefCell::new(device);

    // A sequence that stopped after its address write
    {
        let mut handle = RefCellBus::new(&device);
        let mut guard = handle.lock().unwrap();
        guard.write(&[CONFIG], true).unwrap();
    }

    let mut status = RWBits::new(
        RefCellBus::new(&device),
        RegisterAddress::new(0x20),
        Field::unsigned(0, 8),
    )
    .unwrap();
    assert_eq!(status.read().unwrap(), 0x5A);
    assert_eq!(
        bus.operations(),
        vec![Operation::Read {
            address: 0x20,
            data: vec![0x5A]
        }]
    );
    assert_eq!(bus.register(u16::from(CONFIG)), 0x00);
}
