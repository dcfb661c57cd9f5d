//! Byte-exact acknowledgment strings required to opt into a dangerous
//! policy. Anything other than an exact match is treated as no ack at all.

pub const I_UNDERSTAND_ALLOWING_PRIVATE_CIDRS_IS_DANGEROUS: &str =
    "I_UNDERSTAND_ALLOWING_PRIVATE_CIDRS_IS_DANGEROUS";
pub const I_UNDERSTAND_CGNAT_SECURITY_RISKS: &str = "I_UNDERSTAND_CGNAT_SECURITY_RISKS";
pub const I_UNDERSTAND_MIXED_DNS_RISKS: &str = "I_UNDERSTAND_MIXED_DNS_RISKS";
pub const I_UNDERSTAND_DANGEROUS_PORTS: &str = "I_UNDERSTAND_DANGEROUS_PORTS";
