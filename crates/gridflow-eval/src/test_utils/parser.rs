#![cfg(test)]

//! A small A1-notation formula parser for engine tests.

use gridflow_common::{
    Ast, AxisRef, BinaryOp, CellAddress, CellError, ColumnAddress, ErrorType, RowAddress,
    SheetId, SheetRef, SimpleCellAddress, UnaryOp, column_index,
};

use crate::engine::SheetRegistry;
use crate::traits::{ParseError, ParsedFormula, Parser};

/// `"B2"` on sheet 0.
pub fn cell(label: &str) -> SimpleCellAddress {
    cell_on(0, label)
}

pub fn cell_on(sheet: SheetId, label: &str) -> SimpleCellAddress {
    let split = label
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(label.len());
    let col = column_index(&label[..split]).expect("column label");
    let row: u32 = label[split..].parse().expect("row number");
    SimpleCellAddress::new(sheet, col, row - 1)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TestParser;

impl Parser for TestParser {
    fn parse(
        &self,
        formula: &str,
        base: SimpleCellAddress,
        sheets: &SheetRegistry,
    ) -> Result<ParsedFormula, ParseError> {
        let mut cursor = Cursor {
            src: formula.chars().collect(),
            pos: 0,
            base,
            sheets,
        };
        let ast = cursor.comparison()?;
        cursor.skip_ws();
        if cursor.pos < cursor.src.len() {
            return Err(ParseError::new("unexpected input", cursor.pos));
        }
        Ok(ParsedFormula::new(ast, base))
    }
}

struct Cursor<'a> {
    src: Vec<char>,
    pos: usize,
    base: SimpleCellAddress,
    sheets: &'a SheetRegistry,
}

/// One coordinate of a reference as written: `$` flag plus 0-based index.
type Coord = (bool, u32);

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        self.skip_ws();
        let chars: Vec<char> = s.chars().collect();
        if self.src[self.pos..].starts_with(&chars) {
            self.pos += chars.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), ParseError> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(ParseError::new(format!("expected '{s}'"), self.pos))
        }
    }

    fn comparison(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.concat()?;
        loop {
            let op = if self.eat("<>") {
                BinaryOp::Ne
            } else if self.eat("<=") {
                BinaryOp::Le
            } else if self.eat(">=") {
                BinaryOp::Ge
            } else if self.eat("<") {
                BinaryOp::Lt
            } else if self.eat(">") {
                BinaryOp::Gt
            } else if self.eat("=") {
                BinaryOp::Eq
            } else {
                return Ok(left);
            };
            left = Ast::binary(op, left, self.concat()?);
        }
    }

    fn concat(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.additive()?;
        while self.eat("&") {
            left = Ast::binary(BinaryOp::Concat, left, self.additive()?);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            left = Ast::binary(op, left, self.term()?);
        }
    }

    fn term(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.power()?;
        loop {
            let op = if self.eat("*") {
                BinaryOp::Mul
            } else if self.eat("/") {
                BinaryOp::Div
            } else {
                return Ok(left);
            };
            left = Ast::binary(op, left, self.power()?);
        }
    }

    fn power(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.unary()?;
        while self.eat("^") {
            left = Ast::binary(BinaryOp::Pow, left, self.unary()?);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Ast, ParseError> {
        let op = if self.eat("-") {
            Some(UnaryOp::Minus)
        } else if self.eat("+") {
            Some(UnaryOp::Plus)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = self.unary()?;
            return Ok(Ast::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        let primary = self.primary()?;
        if self.eat("%") {
            return Ok(Ast::Unary {
                op: UnaryOp::Percent,
                operand: Box::new(primary),
            });
        }
        Ok(primary)
    }

    fn primary(&mut self) -> Result<Ast, ParseError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.comparison()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some('"') => {
                self.pos += 1;
                let mut text = String::new();
                loop {
                    match self.peek() {
                        Some('"') if self.src.get(self.pos + 1) == Some(&'"') => {
                            text.push('"');
                            self.pos += 2;
                        }
                        Some('"') => {
                            self.pos += 1;
                            return Ok(Ast::Text(text));
                        }
                        Some(c) => {
                            text.push(c);
                            self.pos += 1;
                        }
                        None => return Err(ParseError::new("unterminated string", start)),
                    }
                }
            }
            Some('#') => {
                let mut literal = String::new();
                while let Some(c) = self.peek() {
                    literal.push(c);
                    self.pos += 1;
                    if c == '!' || c == '?' || (c == 'A' && literal == "#N/A") {
                        break;
                    }
                }
                ErrorType::parse(&literal)
                    .map(|kind| Ast::Error(CellError::new(kind)))
                    .ok_or_else(|| ParseError::new("unknown error literal", start))
            }
            Some('\'') => {
                self.pos += 1;
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\'' {
                        break;
                    }
                    name.push(c);
                }
                self.expect("!")?;
                self.sheet_reference(&name)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let word = self.word();
                if self.peek() == Some(':') {
                    return self.reference(SheetRef::Current, &word, start);
                }
                word.parse::<f64>()
                    .map(Ast::Number)
                    .map_err(|_| ParseError::new("invalid number", start))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '$' || c == '_' => {
                let word = self.word();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    return self.call(&word);
                }
                if self.peek() == Some('!') {
                    self.pos += 1;
                    return self.sheet_reference(&word);
                }
                if word.eq_ignore_ascii_case("TRUE") {
                    return Ok(Ast::Boolean(true));
                }
                if word.eq_ignore_ascii_case("FALSE") {
                    return Ok(Ast::Boolean(false));
                }
                self.reference(SheetRef::Current, &word, start)
            }
            _ => Err(ParseError::new("unexpected token", start)),
        }
    }

    fn word(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn call(&mut self, name: &str) -> Result<Ast, ParseError> {
        let mut args = Vec::new();
        if !self.eat(")") {
            loop {
                args.push(self.comparison()?);
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }
        Ok(Ast::function(name, args))
    }

    fn sheet_reference(&mut self, name: &str) -> Result<Ast, ParseError> {
        let start = self.pos;
        let word = self.word();
        match self.sheets.get_id(name) {
            Some(id) => self.reference(SheetRef::Id(id), &word, start),
            None => {
                // Still consume the reference so the rest of the formula parses.
                self.reference(SheetRef::Current, &word, start)?;
                Ok(Ast::ref_error())
            }
        }
    }

    fn reference(&mut self, sheet: SheetRef, first: &str, start: usize) -> Result<Ast, ParseError> {
        if let Some((col, row)) = split_cell(first) {
            let from = self.cell_address(sheet, col, row);
            if self.peek() != Some(':') {
                return Ok(Ast::CellReference(from));
            }
            self.pos += 1;
            let second = self.word();
            let (col, row) = split_cell(&second)
                .ok_or_else(|| ParseError::new("expected a cell after ':'", self.pos))?;
            let to = self.cell_address(sheet, col, row);
            return Ok(Ast::CellRange {
                start: from,
                end: to,
            });
        }
        let invalid = || ParseError::new(format!("not a reference: {first}"), start);
        if self.peek() != Some(':') {
            return Err(invalid());
        }
        self.pos += 1;
        let second = self.word();
        if let (Some(a), Some(b)) = (split_column(first), split_column(&second)) {
            return Ok(Ast::ColumnRange {
                start: ColumnAddress::new(sheet, self.axis(a, self.base.col)),
                end: ColumnAddress::new(sheet, self.axis(b, self.base.col)),
            });
        }
        if let (Some(a), Some(b)) = (split_row(first), split_row(&second)) {
            return Ok(Ast::RowRange {
                start: RowAddress::new(sheet, self.axis(a, self.base.row)),
                end: RowAddress::new(sheet, self.axis(b, self.base.row)),
            });
        }
        Err(invalid())
    }

    fn axis(&self, (absolute, index): Coord, base: u32) -> AxisRef {
        if absolute {
            AxisRef::absolute(index as i64)
        } else {
            AxisRef::relative(index as i64 - base as i64)
        }
    }

    fn cell_address(&self, sheet: SheetRef, col: Coord, row: Coord) -> CellAddress {
        CellAddress::new(sheet, self.axis(col, self.base.col), self.axis(row, self.base.row))
    }
}

fn split_column(s: &str) -> Option<Coord> {
    let (absolute, letters) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((absolute, column_index(letters)?))
}

fn split_row(s: &str) -> Option<Coord> {
    let (absolute, digits) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    Some((absolute, row.checked_sub(1)?))
}

fn split_cell(s: &str) -> Option<(Coord, Coord)> {
    let body = s.strip_prefix('$').unwrap_or(s);
    let letters = body.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let split = s.len() - body.len() + letters;
    Some((split_column(&s[..split])?, split_row(&s[split..])?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(formula: &str, at: &str) -> Ast {
        let mut sheets = SheetRegistry::new();
        sheets.id_for("Sheet1");
        sheets.id_for("Data");
        TestParser.parse(formula, cell(at), &sheets).unwrap().ast
    }

    #[test]
    fn relative_and_absolute_references() {
        let ast = parse("B1+$C$3", "A2");
        let Ast::Binary { left, right, .. } = ast else {
            panic!("expected binary");
        };
        assert_eq!(
            *left,
            Ast::CellReference(CellAddress::new(
                SheetRef::Current,
                AxisRef::relative(1),
                AxisRef::relative(-1)
            ))
        );
        assert_eq!(*right, Ast::CellReference(CellAddress::absolute(SheetRef::Current, 2, 2)));
    }

    #[test]
    fn ranges_and_functions() {
        let ast = parse("SUM(A1:A3, Data!B:B, 2:3)", "C1");
        let Ast::Function { name, args } = ast else {
            panic!("expected function");
        };
        assert_eq!(name, "SUM");
        assert!(matches!(args[0], Ast::CellRange { .. }));
        assert!(matches!(
            args[1],
            Ast::ColumnRange {
                start: ColumnAddress {
                    sheet: SheetRef::Id(1),
                    ..
                },
                ..
            }
        ));
        assert!(matches!(args[2], Ast::RowRange { .. }));
    }

    #[test]
    fn unknown_sheet_is_a_ref_error() {
        assert_eq!(parse("Nope!A1", "A1"), Ast::ref_error());
    }

    #[test]
    fn comparison_binds_loosest() {
        let ast = parse("1+1=2", "A1");
        assert!(matches!(ast, Ast::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let sheets = SheetRegistry::new();
        assert!(TestParser.parse("1 2", cell("A1"), &sheets).is_err());
    }
}
