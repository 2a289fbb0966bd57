//! Register-level access to the Siemens ISAC-S (PSB 2186 / 2086 / 2085)
//! ISDN subscriber access controller.

pub mod device;
pub mod register;
