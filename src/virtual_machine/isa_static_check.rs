#[cfg(test)]
mod tests {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_ISA_HASH: u64 = 11043176517223883805;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    macro_rules! hash_opcodes {
        (
            $( $(#[$doc:meta])* $name:ident = $opcode:literal, $mnemonic:literal ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &[crate::virtual_machine::isa::OpCode::$name as u8]);
                h = fnv1a64(h, $mnemonic.as_bytes());
            )*
            h
        }};
    }

    macro_rules! hash_selectors {
        (
            $( $(#[$doc:meta])* $name:ident = $value:literal, $mnemonic:literal ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                let value: i64 = $value;
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &value.to_le_bytes());
                h = fnv1a64(h, $mnemonic.as_bytes());
            )*
            h
        }};
    }

    fn current_isa_hash() -> u64 {
        let parts = [
            crate::for_each_opcode!(hash_opcodes),
            crate::for_each_opr_type!(hash_selectors),
            crate::for_each_sio_type!(hash_selectors),
        ];
        parts
            .iter()
            .fold(FNV_OFFSET, |h, part| fnv1a64(h, &part.to_le_bytes()))
    }

    #[test]
    #[ignore]
    fn print_isa_hash() {
        println!("ISA_HASH={}", current_isa_hash());
    }

    #[test]
    fn isa_hash_unchanged() {
        assert_eq!(current_isa_hash(), EXPECTED_ISA_HASH);
    }
}
