pub mod admin_otp;
pub mod booking;
pub mod customer;
pub mod driver;
pub mod notification;
pub mod payment;

pub use admin_otp::{AdminOtp, OtpStatus};
pub use booking::{Booking, BookingFilter, BookingStatus, Location};
pub use customer::{Customer, CustomerPatch, CustomerStatus};
pub use driver::{Driver, DriverPatch, DriverStatus, VehicleDetails};
pub use notification::{Notification, NotificationKind};
pub use payment::Payment;
