//! Unit tests for BCD calendar registers

use crate::common::{MockError, Operation, create_device};
use i2c_register::{
    BcdDateTime, ConfigError, DateTime, DateTimeLayout, Error, HourFormat, RegisterAddress,
};

#[test]
fn test_read_in_one_transaction() {
    let (mut device, bus) = create_device();
    bus.set_registers(0x00, &[0x30, 0x05, 0x04, 0x04, 0x29, 0x02, 0x24]);

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS1307).unwrap();
    let now = clock.read().unwrap();

    assert_eq!(
        now,
        DateTime {
            year: 2024,
            month: 2,
            day: 29,
            weekday: 3,
            hour: 4,
            minute: 5,
            second: 30,
        }
    );
    assert_eq!(bus.transaction_count(), 1);
}

#[test]
fn test_write_reproduces_bytes() {
    let (mut device, bus) = create_device();
    let raw = [0x30, 0x05, 0x04, 0x01, 0x01, 0x01, 0x00];
    bus.set_registers(0x00, &raw);

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS1307).unwrap();
    let value = clock.read().unwrap();
    assert_eq!((value.second, value.minute, value.hour), (30, 5, 4));

    bus.set_registers(0x00, &[0; 7]);
    bus.clear_operations();
    clock.write(&value).unwrap();

    assert_eq!(
        bus.operations(),
        vec![Operation::Write {
            address: 0x00,
            data: raw.to_vec()
        }]
    );
}

#[test]
fn test_twelve_hour_write() {
    let (mut device, bus) = create_device();
    let layout = DateTimeLayout {
        hour: HourFormat::DALLAS.twelve_hour(),
        ..DateTimeLayout::DS3231
    };

    let mut clock = BcdDateTime::new(&mut device, RegisterAddress::new(0x00), layout).unwrap();
    let value = DateTime::new(2024, 7, 4, 21, 15, 0);
    clock.write(&value).unwrap();

    // 12-hour mode, PM, 9 o'clock
    assert_eq!(bus.register(0x02), 0x40 | 0x20 | 0x09);
    assert_eq!(clock.read().unwrap(), value);
}

#[test]
fn test_century_rollover() {
    let (mut device, bus) = create_device();

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS3231).unwrap();
    let value = DateTime::new(2100, 1, 1, 0, 0, 0);
    clock.write(&value).unwrap();

    assert_eq!(bus.register(0x05), 0x81);
    assert_eq!(bus.register(0x06), 0x00);
    assert_eq!(clock.read().unwrap(), value);
}

#[test]
fn test_pcf8523_layout() {
    let (mut device, bus) = create_device();
    // Seconds register of the PCF8523 is 0x03; OS flag set in bit 7
    bus.set_registers(0x03, &[0x80 | 0x59, 0x59, 0x23, 0x31, 0x03, 0x12, 0x99]);

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x03), DateTimeLayout::PCF8523).unwrap();
    let now = clock.read().unwrap();

    assert_eq!(now, DateTime::new(2099, 12, 31, 23, 59, 59));
}

#[test]
fn test_malformed_bcd_is_reported() {
    let (mut device, bus) = create_device();
    bus.set_registers(0x00, &[0x00, 0x00, 0x00, 0x01, 0x3A, 0x01, 0x00]);

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS1307).unwrap();
    assert_eq!(clock.read(), Err(Error::InvalidBcd(0x3A)));
}

#[test]
fn test_invalid_values_rejected_before_transaction() {
    let (mut device, bus) = create_device();

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS1307).unwrap();

    let mut value = DateTime::new(2024, 13, 1, 0, 0, 0);
    assert_eq!(
        clock.write(&value),
        Err(Error::OutOfRange {
            value: 13,
            min: 1,
            max: 12
        })
    );

    value.month = 1;
    value.second = 60;
    assert_eq!(
        clock.write(&value),
        Err(Error::OutOfRange {
            value: 60,
            min: 0,
            max: 59
        })
    );

    assert!(bus.operations().is_empty());
}

#[test]
fn test_write_failure_propagates() {
    let (mut device, bus) = create_device();

    let mut clock =
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), DateTimeLayout::DS1307).unwrap();
    bus.fail_next_write();
    assert_eq!(
        clock.write(&DateTime::new(2024, 1, 1, 0, 0, 0)),
        Err(Error::Bus(MockError::Communication))
    );
    assert!(bus.operations().is_empty());
}

#[test]
fn test_invalid_layout() {
    let (mut device, _bus) = create_device();
    let layout = DateTimeLayout {
        weekday_start: 2,
        ..DateTimeLayout::DS1307
    };

    assert!(matches!(
        BcdDateTime::new(&mut device, RegisterAddress::new(0x00), layout),
        Err(ConfigError::InvalidLayout)
    ));
}
