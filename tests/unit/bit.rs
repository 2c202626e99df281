//! Unit tests for single-bit registers

use crate::common::{MockError, MockI2c, Operation, create_device};
use i2c_register::{
    ByteOrder, ConfigError, Error, I2cDevice, ROBit, RWBit, RegisterAddress,
};

#[test]
fn test_read_bit() {
    let (mut device, bus) = create_device();
    bus.set_register(0x06, 0b0100_0000);

    let mut sleep = RWBit::new(&mut device, RegisterAddress::new(0x06), 6).unwrap();
    assert!(sleep.read().unwrap());

    let mut reset = RWBit::new(&mut device, RegisterAddress::new(0x06), 7).unwrap();
    assert!(!reset.read().unwrap());
}

#[test]
fn test_write_preserves_other_bits() {
    for bit in 0..8u8 {
        for initial in [0x00u8, 0xFF, 0xA5, 0x5A] {
            let (mut device, bus) = create_device();
            bus.set_register(0x10, initial);
            let mask = 1u8 << bit;

            let mut flag = RWBit::new(&mut device, RegisterAddress::new(0x10), bit).unwrap();
            flag.write(true).unwrap();
            assert_eq!(bus.register(0x10), initial | mask);

            flag.write(false).unwrap();
            assert_eq!(bus.register(0x10), initial & !mask);
        }
    }
}

#[test]
fn test_write_back_read_value_is_noop() {
    for bit in 0..8u8 {
        let (mut device, bus) = create_device();
        bus.set_register(0x10, 0xC3);

        let mut flag = RWBit::new(&mut device, RegisterAddress::new(0x10), bit).unwrap();
        let value = flag.read().unwrap();
        flag.write(value).unwrap();
        assert_eq!(bus.register(0x10), 0xC3);
    }
}

#[test]
fn test_write_reads_then_writes() {
    let (mut device, bus) = create_device();
    bus.set_register(0x06, 0x41);

    let mut sleep = RWBit::new(&mut device, RegisterAddress::new(0x06), 6).unwrap();
    sleep.write(false).unwrap();

    assert_eq!(
        bus.operations(),
        vec![
            Operation::Read {
                address: 0x06,
                data: vec![0x41]
            },
            Operation::Write {
                address: 0x06,
                data: vec![0x01]
            },
        ]
    );
    // write_read for the fetch, one write for the store
    assert_eq!(bus.transaction_count(), 2);
}

#[test]
fn test_bit_in_wide_register() {
    let (mut device, bus) = create_device();
    bus.set_registers(0x20, &[0x00, 0xFF]);

    // Big-endian 16-bit register: bit 9 lives in the first byte
    let mut flag =
        RWBit::with_width(&mut device, RegisterAddress::new(0x20), 9, 2, ByteOrder::Big).unwrap();
    flag.write(true).unwrap();
    assert_eq!(bus.registers(0x20, 2), vec![0x02, 0xFF]);

    // Little-endian: bit 9 lives in the second byte
    bus.set_registers(0x30, &[0xFF, 0x00]);
    let mut flag = RWBit::with_width(&mut device, RegisterAddress::new(0x30), 9, 2, ByteOrder::Little)
        .unwrap();
    flag.write(true).unwrap();
    assert_eq!(bus.registers(0x30, 2), vec![0xFF, 0x02]);
    assert!(flag.read().unwrap());
}

#[test]
fn test_wide_register_address() {
    let bus = MockI2c::wide(0x3C, true);
    let mut device = I2cDevice::new(bus.clone(), 0x3C);
    bus.set_register(0x300A, 0x80);

    let address = RegisterAddress::wide(0x300A, ByteOrder::Big);
    let mut flag = RWBit::new(&mut device, address, 0).unwrap();
    flag.write(true).unwrap();

    assert_eq!(bus.register(0x300A), 0x81);
    assert_eq!(flag.address(), address);
}

#[test]
fn test_read_only_bit() {
    let (mut device, bus) = create_device();
    bus.set_register(0x19, 0x01);

    let mut ready = ROBit::new(&mut device, RegisterAddress::new(0x19), 0).unwrap();
    assert!(ready.read().unwrap());
    assert!(
        bus.operations()
            .iter()
            .all(|op| matches!(op, Operation::Read { .. }))
    );
}

#[test]
fn test_invalid_bit_index() {
    let (mut device, _bus) = create_device();

    let result = RWBit::new(&mut device, RegisterAddress::new(0x06), 8);
    assert!(matches!(
        result,
        Err(ConfigError::BitOutOfRange {
            bit: 8,
            register_width: 1
        })
    ));

    let result = RWBit::with_width(&mut device, RegisterAddress::new(0x06), 0, 5, ByteOrder::Little);
    assert!(matches!(result, Err(ConfigError::RegisterWidth(5))));
}

#[test]
fn test_read_failure_skips_write() {
    let (mut device, bus) = create_device();
    bus.set_register(0x06, 0x00);

    let mut flag = RWBit::new(&mut device, RegisterAddress::new(0x06), 3).unwrap();
    bus.fail_next_read();

    let result = flag.write(true);
    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(bus.register(0x06), 0x00);
    assert!(bus.operations().is_empty());

    // Subsequent write should succeed (error was only for one operation)
    flag.write(true).unwrap();
    assert_eq!(bus.register(0x06), 0x08);
}

#[test]
fn test_wrong_device_address() {
    let bus = MockI2c::new(0x68);
    let mut device = I2cDevice::new(bus, 0x69);

    let mut flag = RWBit::new(&mut device, RegisterAddress::new(0x06), 0).unwrap();
    assert!(matches!(flag.read(), Err(Error::Bus(MockError::NoAcknowledge))));
}

#[cfg(feature = "alloc")]
#[test]
fn test_lazy_bit() {
    let (mut device, bus) = create_device();
    bus.set_register(0x06, 0x10);

    let mut flag = RWBit::new_lazy(&mut device, RegisterAddress::new(0x06), 4).unwrap();
    assert!(flag.read().unwrap());
    flag.write(false).unwrap();
    assert_eq!(bus.register(0x06), 0x00);
}
