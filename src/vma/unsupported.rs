//! Backend for platforms with no mapping-query mechanism.

use super::Vma;
use crate::error::NotAvailable;

pub(super) fn locate(_address: usize) -> Result<Vma, NotAvailable> {
    Err(NotAvailable)
}
