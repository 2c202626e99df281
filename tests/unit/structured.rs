//! Unit tests for structured registers

use crate::common::{Operation, create_device};
use i2c_register::{
    ConfigError, Element, Error, Kind, ROUnaryStruct, RegisterAddress, Struct, StructArray,
    UnaryStruct,
};

const SAMPLE: &[Element] = &[Element::le(Kind::U16), Element::le(Kind::I8)];

#[test]
fn test_struct_round_trip() {
    let (mut device, bus) = create_device();

    let mut sample = Struct::new(&mut device, RegisterAddress::new(0x10), SAMPLE).unwrap();
    sample.write(&[1000, -5]).unwrap();
    assert_eq!(bus.registers(0x10, 3), vec![0xE8, 0x03, 0xFB]);

    let mut values = [0i64; 2];
    sample.read(&mut values).unwrap();
    assert_eq!(values, [1000, -5]);
}

#[test]
fn test_struct_write_needs_no_read() {
    let (mut device, bus) = create_device();

    let mut sample = Struct::new(&mut device, RegisterAddress::new(0x10), SAMPLE).unwrap();
    sample.write(&[1, 2]).unwrap();

    assert_eq!(
        bus.operations(),
        vec![Operation::Write {
            address: 0x10,
            data: vec![0x01, 0x00, 0x02]
        }]
    );
    assert_eq!(bus.transaction_count(), 1);
}

#[test]
fn test_accelerometer_axes() {
    let (mut device, bus) = create_device();
    // ACCEL_XOUT_H..ACCEL_ZOUT_L, big-endian
    bus.set_registers(0x2D, &[0x01, 0x00, 0xFF, 0x38, 0x80, 0x00]);

    const AXES: &[Element] = &[
        Element::be(Kind::I16),
        Element::be(Kind::I16),
        Element::be(Kind::I16),
    ];
    let mut accel = Struct::new(&mut device, RegisterAddress::new(0x2D), AXES).unwrap();
    let mut xyz = [0i64; 3];
    accel.read(&mut xyz).unwrap();
    assert_eq!(xyz, [256, -200, -32768]);

    // One write_read for all six bytes
    assert_eq!(bus.transaction_count(), 1);
}

#[test]
fn test_struct_validation_before_transaction() {
    let (mut device, bus) = create_device();
    bus.set_registers(0x10, &[0xAA, 0xBB, 0xCC]);

    let mut sample = Struct::new(&mut device, RegisterAddress::new(0x10), SAMPLE).unwrap();

    assert_eq!(
        sample.write(&[1000]),
        Err(Error::Arity {
            expected: 2,
            actual: 1
        })
    );
    assert_eq!(
        sample.write(&[70000, 0]),
        Err(Error::OutOfRange {
            value: 70000,
            min: 0,
            max: 65535
        })
    );
    assert_eq!(
        sample.write(&[0, 128]),
        Err(Error::OutOfRange {
            value: 128,
            min: -128,
            max: 127
        })
    );
    let mut too_many = [0i64; 3];
    assert_eq!(
        sample.read(&mut too_many),
        Err(Error::Arity {
            expected: 2,
            actual: 3
        })
    );

    assert!(bus.operations().is_empty());
    assert_eq!(bus.registers(0x10, 3), vec![0xAA, 0xBB, 0xCC]);
}

#[test]
fn test_struct_construction_errors() {
    let (mut device, _bus) = create_device();

    assert!(matches!(
        Struct::new(&mut device, RegisterAddress::new(0x10), &[]),
        Err(ConfigError::EmptyFormat)
    ));

    // Three 32-bit values need 12 payload bytes
    const WIDE: &[Element] = &[
        Element::le(Kind::U32),
        Element::le(Kind::U32),
        Element::le(Kind::U32),
    ];
    assert!(matches!(
        Struct::new(&mut device, RegisterAddress::new(0x10), WIDE),
        Err(ConfigError::BufferTooSmall {
            needed: 13,
            capacity: 10
        })
    ));
}

#[test]
fn test_unary_struct() {
    let (mut device, bus) = create_device();

    let mut pressure =
        UnaryStruct::new(&mut device, RegisterAddress::new(0x04), Element::le(Kind::U24)).unwrap();
    pressure.write(0x12_3456).unwrap();
    assert_eq!(bus.registers(0x04, 3), vec![0x56, 0x34, 0x12]);
    assert_eq!(pressure.read().unwrap(), 0x12_3456);

    assert_eq!(
        pressure.write(-1),
        Err(Error::OutOfRange {
            value: -1,
            min: 0,
            max: 0xFF_FFFF
        })
    );
}

#[test]
fn test_read_only_unary_struct() {
    let (mut device, bus) = create_device();
    bus.set_registers(0x39, &[0xFE, 0x0C]);

    let mut temperature =
        ROUnaryStruct::new(&mut device, RegisterAddress::new(0x39), Element::be(Kind::I16))
            .unwrap();
    assert_eq!(temperature.read().unwrap(), -500);
}

#[test]
fn test_struct_array() {
    let (mut device, bus) = create_device();
    const OFFSET: &[Element] = &[Element::be(Kind::I16)];

    let mut offsets: StructArray<'_, _> =
        StructArray::new(&mut device, RegisterAddress::new(0x77), OFFSET, 3).unwrap();
    assert_eq!(offsets.len(), 3);

    offsets.set(0, &[-1]).unwrap();
    offsets.set(2, &[0x1234]).unwrap();
    assert_eq!(
        bus.registers(0x77, 6),
        vec![0xFF, 0xFF, 0x00, 0x00, 0x12, 0x34]
    );

    let mut value = [0i64; 1];
    offsets.get(2, &mut value).unwrap();
    assert_eq!(value, [0x1234]);
    offsets.get(0, &mut value).unwrap();
    assert_eq!(value, [-1]);

    bus.clear_operations();
    assert_eq!(
        offsets.get(3, &mut value),
        Err(Error::Index { index: 3, count: 3 })
    );
    assert_eq!(
        offsets.set(5, &[0]),
        Err(Error::Index { index: 5, count: 3 })
    );
    assert!(bus.operations().is_empty());
}

#[test]
fn test_struct_array_address_space() {
    let (mut device, _bus) = create_device();
    const PAIR: &[Element] = &[Element::le(Kind::U8), Element::le(Kind::U8)];

    // Element 2 would start at 0x100
    let result: Result<StructArray<'_, _>, _> =
        StructArray::new(&mut device, RegisterAddress::new(0xFC), PAIR, 3);
    assert!(matches!(result, Err(ConfigError::AddressOutOfRange(0x100))));

    let result: Result<StructArray<'_, _>, _> =
        StructArray::new(&mut device, RegisterAddress::new(0xFC), PAIR, 2);
    assert!(result.is_ok());
}

#[cfg(feature = "alloc")]
#[test]
fn test_lazy_struct_beyond_inline_capacity() {
    let (mut device, bus) = create_device();
    const WIDE: &[Element] = &[
        Element::le(Kind::U32),
        Element::le(Kind::I32),
        Element::be(Kind::U32),
    ];

    let mut block = Struct::new_lazy(&mut device, RegisterAddress::new(0x20), WIDE).unwrap();
    block.write(&[1, -1, 2]).unwrap();
    assert_eq!(
        bus.registers(0x20, 12),
        vec![1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 2]
    );

    let mut values = [0i64; 3];
    block.read(&mut values).unwrap();
    assert_eq!(values, [1, -1, 2]);
}
