use crate::error::Error;

/// A single subscription target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressEntry {
    pub address: String,
    pub is_required: bool,
}

/// Ordered list of subscription target addresses, each tagged as required
/// (the transaction must touch it) or merely included.
#[derive(Default, Debug)]
pub struct AddressRegistry {
    entries: Vec<AddressEntry>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an address. Fails with `DuplicateAddress` if it is already
    /// present and with `InvalidAddress` if it does not pass validation.
    /// Returns the updated list on success.
    pub fn add(&mut self, address: &str, is_required: bool) -> Result<&[AddressEntry], Error> {
        if self.entries.iter().any(|entry| entry.address == address) {
            return Err(Error::DuplicateAddress(address.to_string()));
        }
        if !is_valid_address(address) {
            return Err(Error::InvalidAddress(address.to_string()));
        }
        self.entries.push(AddressEntry {
            address: address.to_string(),
            is_required,
        });
        Ok(&self.entries)
    }

    /// Removes the entry with the given address.
    pub fn remove(&mut self, address: &str) -> Result<(), Error> {
        match self.entries.iter().position(|entry| entry.address == address) {
            Some(index) => {
                self.entries.remove(index);
                Ok(())
            }
            None => Err(Error::AddressNotFound(address.to_string())),
        }
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Splits the registry into `(required, included)` address lists,
    /// preserving insertion order within each group. These become the
    /// `accountRequire` and `accountInclude` arrays of the subscribe request.
    pub fn partition(&self) -> (Vec<String>, Vec<String>) {
        let mut required = Vec::new();
        let mut included = Vec::new();
        for entry in &self.entries {
            if entry.is_required {
                required.push(entry.address.clone());
            } else {
                included.push(entry.address.clone());
            }
        }
        (required, included)
    }
}

/// An address is accepted when it decodes from base58 to exactly 32 bytes
/// whose canonical re-encoding is 43 characters long. This mirrors the
/// upstream filter semantics; no checksum exists to verify.
fn is_valid_address(address: &str) -> bool {
    let bytes = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if bytes.len() != 32 {
        return false;
    }
    bs58::encode(&bytes).into_string().len() == 43
}
