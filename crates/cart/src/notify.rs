//! Shopper-facing failure notices.
//!
//! A failed cart operation produces exactly one [`Notice`]: the [`Toast`] the
//! shopper sees plus the internal [`ErrorKind`]. Toast texts are fixed; two
//! different failures (a catalog miss while adding and a stock lookup failure
//! while changing a quantity) both surface as [`Toast::AddFailed`], so the
//! kind is what tells them apart.

use std::sync::Arc;

use crate::error::ErrorKind;

/// Fixed, shopper-facing failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toast {
    AddFailed,
    RemoveFailed,
    UpdateFailed,
    OutOfStock,
}

impl Toast {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AddFailed => "Error adding product",
            Self::RemoveFailed => "Error removing product",
            Self::UpdateFailed => "Error changing product quantity",
            Self::OutOfStock => "Requested quantity is out of stock",
        }
    }
}

impl ::core::fmt::Display for Toast {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(self.message())
    }
}

/// A failure report for one cart operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub toast: Toast,
    pub kind: ErrorKind,
}

impl Notice {
    #[must_use]
    pub const fn new(toast: Toast, kind: ErrorKind) -> Self {
        Self { toast, kind }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.toast.message()
    }
}

/// One-way channel for showing failures to the shopper.
///
/// Fire-and-forget: implementations must not block and cannot fail.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice);
    }
}
