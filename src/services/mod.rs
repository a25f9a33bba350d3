pub mod booking;
pub mod notifications;
pub mod otp;
pub mod payments;
