pub mod checkout;
pub mod webhook_apply;
