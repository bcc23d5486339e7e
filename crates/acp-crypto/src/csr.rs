//! PKCS#10 certificate signing request issuance (spec §4.2 `generate_csr`).
//!
//! Subject is fixed at `CN=<aid>, O=SomeOrganization, L=SomeCity,
//! ST=SomeState, C=CN` with a critical `basicConstraints=CA:FALSE`
//! extension, SHA-256 signed — exactly the shape the CA service in spec
//! §4.14 (`<ca_base>/issue_cert`) expects.

use rcgen::{CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

use crate::error::CryptoError;

pub fn generate_csr(aid: &str, key_pem: &str) -> Result<String, CryptoError> {
    let key_pair = KeyPair::from_pem(key_pem).map_err(|e| CryptoError::Csr(e.to_string()))?;

    let mut params =
        CertificateParams::new(Vec::<String>::new()).map_err(|e| CryptoError::Csr(e.to_string()))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, aid);
    dn.push(DnType::OrganizationName, "SomeOrganization");
    dn.push(DnType::LocalityName, "SomeCity");
    dn.push(DnType::StateOrProvinceName, "SomeState");
    dn.push(DnType::CountryName, "CN");
    params.distinguished_name = dn;
    // IsCa::ExplicitNoCa encodes the critical basicConstraints=CA:FALSE extension.
    params.is_ca = IsCa::ExplicitNoCa;

    let csr = params
        .serialize_request(&key_pair)
        .map_err(|e| CryptoError::Csr(e.to_string()))?;
    csr.pem().map_err(|e| CryptoError::Pem(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::generate_ec_p384_key;

    #[test]
    fn generates_a_parseable_pem_csr() {
        let key_pem = generate_ec_p384_key().unwrap();
        let csr_pem = generate_csr("alice.aid.pub", &key_pem).unwrap();
        assert!(csr_pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
    }
}
