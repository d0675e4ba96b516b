use crate::{
    constant::{
        BINARY, CLOSE_BRACKET, COMMA, COMMENT, HEX, HEX_SUFFIX, MAX_OPERANDS, MEMORY_SIZE, OFFSET,
        OPEN_BRACKET, REPEAT, RESERVED, STR,
    },
    data::{CompileError, CompileErrorCode, Range},
    memory::Width,
    operand::Operand,
    register::RegisterRef,
    tokenizer::LineCursor,
};

fn all_digits(s: &str, radix: u32) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_digit(radix))
}

fn from_radix(raw: &str, digits: &str, radix: u32) -> Result<u32, String> {
    u32::from_str_radix(digits, radix)
        .map_err(|err| format!("[ {raw} ] is an invalid base {radix} literal :: [ {err} ]"))
}

/// Parses `123`, `0x7f`, `0b101`, `7fh` or `101b`.
pub fn parse_number(raw: &str) -> Result<u32, String> {
    let s = raw.trim().to_ascii_lowercase();
    if let Some(digits) = s.strip_prefix(&format!("0{HEX}")) {
        if all_digits(digits, 16) {
            return from_radix(raw, digits, 16);
        }
    }
    if let Some(digits) = s.strip_prefix(&format!("0{BINARY}")) {
        if all_digits(digits, 2) {
            return from_radix(raw, digits, 2);
        }
    }
    if let Some(digits) = s.strip_suffix(HEX_SUFFIX) {
        if digits.starts_with(|c: char| c.is_ascii_digit()) && all_digits(digits, 16) {
            return from_radix(raw, digits, 16);
        }
    }
    if let Some(digits) = s.strip_suffix(BINARY) {
        if all_digits(digits, 2) {
            return from_radix(raw, digits, 2);
        }
    }
    if all_digits(&s, 10) {
        return from_radix(raw, &s, 10);
    }
    Err(format!("[ {raw} ] is not a number"))
}

/// Data constant and option names: `[A-z][A-z0-9_-]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Text labels: a letter, then letters, digits or `_`.
pub fn is_label_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_register_name(s: &str) -> bool {
    s.parse::<RegisterRef>().is_ok()
}

fn err(code: CompileErrorCode, line: usize, range: Range) -> CompileError {
    CompileError::new(code, line, range)
}

fn parse_register(raw: &str, line: usize, range: Range) -> Result<RegisterRef, CompileError> {
    raw.trim().parse::<RegisterRef>().map_err(|_| {
        err(CompileErrorCode::InvalidTokenRegister, line, range)
            .with_detail(format!("invalid register \"{}\"", raw.trim()))
    })
}

/// Parses the comma separated operand list that follows a mnemonic.
pub fn parse_operands(cursor: &mut LineCursor, line: usize) -> Result<Vec<Operand>, CompileError> {
    let mut operands = vec![];
    while !cursor.at_line_end() {
        if !operands.is_empty() {
            let at = cursor.position();
            if !cursor.eat(COMMA) {
                return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(at))
                    .with_detail("expected `,` between operands"));
            }
            cursor.eat_whitespace();
        }
        if operands.len() == MAX_OPERANDS {
            return Err(err(
                CompileErrorCode::UnexpectedToken,
                line,
                Range::from(cursor.position()),
            )
            .with_detail(format!("at most {MAX_OPERANDS} operands are allowed")));
        }
        operands.push(parse_operand(cursor, line)?);
    }
    Ok(operands)
}

pub fn parse_operand(cursor: &mut LineCursor, line: usize) -> Result<Operand, CompileError> {
    let start = cursor.position();
    match cursor.peek() {
        Some(OPEN_BRACKET) => parse_memory(cursor, line),
        Some(c) if c.is_ascii_digit() => {
            let raw = cursor.eat_while(|c| c != COMMA && c != COMMENT && !c.is_whitespace());
            let value = parse_number(&raw).map_err(|reason| {
                err(
                    CompileErrorCode::InvalidTokenNumber,
                    line,
                    Range::span(start, cursor.position()),
                )
                .with_detail(reason)
            })?;
            Ok(Operand::Const(value))
        }
        Some(STR) => {
            cursor.next();
            let text = cursor.eat_while(|c| c != STR);
            if !cursor.eat(STR) {
                return Err(err(CompileErrorCode::MissingToken, line, Range::from(start))
                    .with_detail("closing `\"`"));
            }
            Ok(Operand::String(text))
        }
        _ if cursor.starts_with(OFFSET, true) => {
            cursor.skip(OFFSET.len());
            cursor.eat_whitespace();
            let name = cursor.eat_while(|c| c != COMMA && c != COMMENT && !c.is_whitespace());
            if !is_identifier(&name) {
                return Err(err(
                    CompileErrorCode::IllegalNamingScheme,
                    line,
                    Range::span(start, cursor.position()),
                )
                .with_detail(name));
            }
            Ok(Operand::DataOffset(name))
        }
        _ => {
            let raw = cursor.eat_while(|c| c != COMMA && c != COMMENT);
            let desc = raw.trim_end();
            let range = Range::span(start, cursor.position());
            if desc.is_empty() {
                return Err(err(CompileErrorCode::MissingToken, line, range).with_detail("operand"));
            }
            if let Ok(register) = desc.parse::<RegisterRef>() {
                Ok(Operand::Register(register))
            } else if is_label_name(desc) {
                Ok(Operand::Label(desc.to_string()))
            } else {
                Err(err(CompileErrorCode::UnexpectedToken, line, range).with_detail(desc))
            }
        }
    }
}

fn parse_memory(cursor: &mut LineCursor, line: usize) -> Result<Operand, CompileError> {
    let start = cursor.position();
    cursor.next();
    cursor.eat_whitespace();

    if cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
        let raw = cursor.eat_while(|c| c != CLOSE_BRACKET);
        let range = Range::span(start, cursor.position());
        if !cursor.eat(CLOSE_BRACKET) {
            return Err(err(CompileErrorCode::InvalidTokenDirectMemory, line, range)
                .with_detail("missing `]`"));
        }
        let address = parse_number(&raw).map_err(|reason| {
            err(CompileErrorCode::InvalidTokenDirectMemory, line, range).with_detail(reason)
        })?;
        return Ok(Operand::MemDirect(address));
    }

    let contents = cursor.eat_while(|c| c != CLOSE_BRACKET);
    if !cursor.eat(CLOSE_BRACKET) {
        return Err(err(
            CompileErrorCode::MissingToken,
            line,
            Range::span(start, cursor.position()),
        )
        .with_detail("closing `]`"));
    }
    let range = Range::span(start, cursor.position());
    let contents = contents.trim();

    if let Some(idx) = contents.find('+').or_else(|| contents.find('-')) {
        let register = parse_register(&contents[..idx], line, range)?;
        let offset_str = contents[idx + 1..].trim();
        let offset = parse_number(offset_str)
            .and_then(|value| {
                i32::try_from(value).map_err(|_| format!("[ {offset_str} ] offset too large"))
            })
            .map_err(|reason| {
                err(CompileErrorCode::InvalidTokenNumber, line, range).with_detail(reason)
            })?;
        let offset = if contents[idx..].starts_with('-') {
            -offset
        } else {
            offset
        };
        return Ok(Operand::MemIndexed(register, offset));
    }

    let Ok(first) = contents.parse::<RegisterRef>() else {
        if is_identifier(contents) {
            return Ok(Operand::DataMemReference(contents.to_string()));
        }
        return Err(err(CompileErrorCode::InvalidTokenRegister, line, range)
            .with_detail(format!("invalid register \"{contents}\"")));
    };

    cursor.eat_whitespace();
    let second_start = cursor.position();
    if !cursor.eat(OPEN_BRACKET) {
        return Ok(Operand::MemIndirect(first));
    }
    let raw = cursor.eat_while(|c| c != CLOSE_BRACKET);
    if !cursor.eat(CLOSE_BRACKET) {
        return Err(err(
            CompileErrorCode::MissingToken,
            line,
            Range::span(second_start, cursor.position()),
        )
        .with_detail("closing `]`"));
    }
    let second = parse_register(&raw, line, Range::span(second_start, cursor.position()))?;
    Ok(Operand::MemDoubleIndexed(first, second))
}

/// Parses the value list of a data definition: numbers, `?`, `count*value`,
/// `count*?` and (for `db`) double quoted strings.
pub fn parse_data_values(
    cursor: &mut LineCursor,
    line: usize,
    width: Width,
) -> Result<Vec<Option<u32>>, CompileError> {
    let mut values = vec![];
    loop {
        cursor.eat_whitespace();
        let start = cursor.position();
        if cursor.peek() == Some(STR) {
            if width != Width::Byte {
                return Err(err(
                    CompileErrorCode::IllegalStringSizeScheme,
                    line,
                    Range::from(start),
                )
                .with_detail(format!("got size {width}")));
            }
            cursor.next();
            let text = cursor.eat_while(|c| c != STR);
            if !cursor.eat(STR) {
                return Err(err(CompileErrorCode::MissingToken, line, Range::from(start))
                    .with_detail("closing `\"`"));
            }
            values.extend(text.chars().map(|c| Some((c as u32).min(0xff))));
            values.push(Some(0));
        } else {
            let token = cursor.eat_while(|c| c != COMMA && c != COMMENT);
            let range = Range::span(start, cursor.position());
            let token = token.trim();
            if token.is_empty() {
                return Err(err(CompileErrorCode::MissingToken, line, range).with_detail("value"));
            }
            let parsed = parse_data_value(token, width)
                .map_err(|(code, reason)| err(code, line, range).with_detail(reason))?;
            values.extend(parsed);
        }
        if cursor.at_line_end() {
            return Ok(values);
        }
        let at = cursor.position();
        if !cursor.eat(COMMA) {
            return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(at))
                .with_detail("expected `,` between values"));
        }
    }
}

fn parse_data_value(
    token: &str,
    width: Width,
) -> Result<Vec<Option<u32>>, (CompileErrorCode, String)> {
    let element = |raw: &str| -> Result<Option<u32>, (CompileErrorCode, String)> {
        let raw = raw.trim();
        if raw.len() == 1 && raw.starts_with(RESERVED) {
            return Ok(None);
        }
        if raw.contains(REPEAT) {
            return Err((
                CompileErrorCode::UnexpectedToken,
                format!("[ {token} ] nested repetition"),
            ));
        }
        parse_number(raw)
            .map(Some)
            .map_err(|reason| (CompileErrorCode::InvalidTokenNumber, reason))
    };

    let Some((count, value)) = token.split_once(REPEAT) else {
        return Ok(vec![element(token)?]);
    };
    let count = parse_number(count)
        .map_err(|reason| (CompileErrorCode::InvalidTokenNumber, reason))?;
    if count as usize * width.bytes() > MEMORY_SIZE {
        return Err((
            CompileErrorCode::InvalidTokenNumber,
            format!("[ {token} ] does not fit into memory"),
        ));
    }
    let value = element(value)?;
    Ok(vec![value; count as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{Gpr, View};

    fn operand(src: &str) -> Result<Operand, CompileError> {
        parse_operand(&mut LineCursor::new(src), 0)
    }

    fn code(result: Result<Operand, CompileError>) -> CompileErrorCode {
        result.unwrap_err().code
    }

    #[test]
    fn number_syntaxes() {
        assert_eq!(parse_number("123"), Ok(123));
        assert_eq!(parse_number("0x7F"), Ok(0x7f));
        assert_eq!(parse_number("0b101"), Ok(5));
        assert_eq!(parse_number("0ffh"), Ok(0xff));
        assert_eq!(parse_number("101b"), Ok(5));
        assert_eq!(parse_number("0x1b"), Ok(0x1b));
        assert_eq!(parse_number(" 42 "), Ok(42));
        assert!(parse_number("123hsd").is_err());
        assert!(parse_number("ffh").is_err());
        assert!(parse_number("0x").is_err());
        assert!(parse_number("4294967296").is_err());
        assert!(parse_number("-1").is_err());
    }

    #[test]
    fn names() {
        assert!(is_identifier("buffer_1-a"));
        assert!(!is_identifier("123a"));
        assert!(!is_identifier(""));
        assert!(is_label_name("a_1"));
        assert!(!is_label_name("_x"));
        assert!(!is_label_name("__lib"));
        assert!(!is_label_name("a-b"));
        assert!(is_register_name("EAX"));
        assert!(!is_register_name("eaxx"));
    }

    #[test]
    fn plain_operands() {
        assert_eq!(operand("0x10"), Ok(Operand::Const(0x10)));
        assert_eq!(
            operand("EAX"),
            Ok(Operand::Register(RegisterRef::new(Gpr::Eax, View::Full)))
        );
        assert_eq!(operand("loop_1"), Ok(Operand::Label("loop_1".into())));
        assert_eq!(operand("\"hi, there\""), Ok(Operand::String("hi, there".into())));
        assert_eq!(operand("OFFSET msg"), Ok(Operand::DataOffset("msg".into())));
        assert_eq!(code(operand("123hsd")), CompileErrorCode::InvalidTokenNumber);
        assert_eq!(code(operand("\"open")), CompileErrorCode::MissingToken);
        assert_eq!(code(operand("a b")), CompileErrorCode::UnexpectedToken);
    }

    #[test]
    fn memory_operands() {
        let ebx = RegisterRef::new(Gpr::Ebx, View::Full);
        assert_eq!(operand("[0x66]"), Ok(Operand::MemDirect(0x66)));
        assert_eq!(operand("[ebx]"), Ok(Operand::MemIndirect(ebx)));
        assert_eq!(operand("[esp + 12]"), Ok(Operand::MemIndexed("esp".parse().unwrap(), 12)));
        assert_eq!(operand("[ebx-0x4]"), Ok(Operand::MemIndexed(ebx, -4)));
        assert_eq!(
            operand("[DX][CX]"),
            Ok(Operand::MemDoubleIndexed(
                "dx".parse().unwrap(),
                "cx".parse().unwrap()
            ))
        );
        assert_eq!(operand("[msg]"), Ok(Operand::DataMemReference("msg".into())));
        assert_eq!(code(operand("[123hsd]")), CompileErrorCode::InvalidTokenDirectMemory);
        assert_eq!(code(operand("[EAX][NOREG]")), CompileErrorCode::InvalidTokenRegister);
        assert_eq!(code(operand("[EDX")), CompileErrorCode::MissingToken);
        assert_eq!(code(operand("[foo+4]")), CompileErrorCode::InvalidTokenRegister);
        assert_eq!(code(operand("[eax+zz]")), CompileErrorCode::InvalidTokenNumber);
    }

    #[test]
    fn operand_lists() {
        let mut cursor = LineCursor::new("eax, [ebx+4] ; comment");
        let operands = parse_operands(&mut cursor, 0).unwrap();
        assert_eq!(operands.len(), 2);

        let mut cursor = LineCursor::new("eax,");
        assert_eq!(
            parse_operands(&mut cursor, 0).unwrap_err().code,
            CompileErrorCode::MissingToken
        );

        let mut cursor = LineCursor::new("1, 2, 3, 4, 5");
        assert_eq!(
            parse_operands(&mut cursor, 0).unwrap_err().code,
            CompileErrorCode::UnexpectedToken
        );
    }

    #[test]
    fn data_values() {
        let values = |src: &str, width| parse_data_values(&mut LineCursor::new(src), 0, width);
        assert_eq!(
            values("0x55, 0x56 ; three", Width::Byte),
            Ok(vec![Some(0x55), Some(0x56)])
        );
        assert_eq!(values("2*?", Width::Byte), Ok(vec![None, None]));
        assert_eq!(values("3*7, ?", Width::Dword), Ok(vec![Some(7), Some(7), Some(7), None]));
        assert_eq!(
            values("\"Hi\"", Width::Byte),
            Ok(vec![Some(b'H' as u32), Some(b'i' as u32), Some(0)])
        );
        assert_eq!(
            values("\"Hi\"", Width::Dword).unwrap_err().code,
            CompileErrorCode::IllegalStringSizeScheme
        );
        assert_eq!(
            values("2*2*?", Width::Dword).unwrap_err().code,
            CompileErrorCode::UnexpectedToken
        );
        assert_eq!(values("", Width::Byte).unwrap_err().code, CompileErrorCode::MissingToken);
        assert_eq!(
            values("12 13", Width::Byte).unwrap_err().code,
            CompileErrorCode::InvalidTokenNumber
        );
    }
}
