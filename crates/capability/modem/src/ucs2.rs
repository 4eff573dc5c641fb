//! UCS2（UTF-16BE 十六进制）短信内容解码。
//!
//! 判定规则：去掉空格/回车/换行/引号后，若剩余为长度 ≥ 4 的十六进制串，
//! 先截掉尾部不完整的半字节/半字（对齐到 4 个十六进制字符），再按
//! UTF-16BE 解码；否则原样返回。

/// 按需解码：疑似 UCS2 十六进制则解码，否则透传。
pub fn decode_ucs2_if_needed(content: &str) -> String {
    let stripped: String = content
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '\r' | '\n' | '"'))
        .collect();
    if stripped.len() < 4 || !stripped.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return content.to_string();
    }
    // 对齐到完整 UTF-16 码元（4 个十六进制字符）
    let aligned = &stripped[..stripped.len() - stripped.len() % 4];
    if aligned.is_empty() {
        return content.to_string();
    }

    let mut units = Vec::with_capacity(aligned.len() / 4);
    for chunk in aligned.as_bytes().chunks_exact(4) {
        let text = match std::str::from_utf8(chunk) {
            Ok(text) => text,
            Err(_) => return content.to_string(),
        };
        match u16::from_str_radix(text, 16) {
            Ok(unit) => units.push(unit),
            Err(_) => return content.to_string(),
        }
    }
    match String::from_utf16(&units) {
        Ok(decoded) => decoded,
        Err(_) => content.to_string(),
    }
}

/// UTF-16BE 十六进制编码（测试与回归对照用）。
pub fn encode_ucs2_hex(content: &str) -> String {
    content
        .encode_utf16()
        .map(|unit| format!("{unit:04X}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_chinese_pair() {
        assert_eq!(decode_ucs2_if_needed("4F604F60"), "你你");
    }

    #[test]
    fn round_trips_utf16_representable_strings() {
        for sample in ["你好，世界", "hello", "héllo wörld", "πρᾶξις", "𝄞 music"] {
            assert_eq!(decode_ucs2_if_needed(&encode_ucs2_hex(sample)), sample);
        }
    }

    #[test]
    fn passes_through_non_hex() {
        assert_eq!(decode_ucs2_if_needed("Hello"), "Hello");
        assert_eq!(decode_ucs2_if_needed("4F60XY"), "4F60XY");
        assert_eq!(decode_ucs2_if_needed("验证码 123456"), "验证码 123456");
    }

    #[test]
    fn short_hex_passes_through() {
        assert_eq!(decode_ucs2_if_needed("4F"), "4F");
        assert_eq!(decode_ucs2_if_needed(""), "");
    }

    #[test]
    fn trims_trailing_partial_units() {
        // 尾部多出的半字被截掉
        assert_eq!(decode_ucs2_if_needed("4F604F604F"), "你你");
        assert_eq!(decode_ucs2_if_needed("4F604F604F6"), "你你");
    }

    #[test]
    fn ignores_whitespace_and_quotes() {
        assert_eq!(decode_ucs2_if_needed("\"4F60 4F60\"\r\n"), "你你");
    }
}
