//! Common test utilities and mock implementations


pub use mock_interface::{MockError, MockI2c, Operation};
pub use mock_spi::MockSpi;
pub use test_utils::{DEVICE_ADDRESS, create_device};
