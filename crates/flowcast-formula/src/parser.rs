//! Formula parser
//!
//! A recursive descent parser for model formulas with proper operator precedence.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::registry;
use flowcast_core::ReferenceKey;

/// Parse a formula string into an AST
///
/// A leading `=` is accepted and ignored. An empty formula is a syntax error
/// here; callers that treat "no formula" as zero check for it first.
///
/// # Example
/// ```rust
/// use flowcast_formula::parse_formula;
///
/// let ast = parse_formula("R4 + R7 * C1.10").unwrap();
/// let ast = parse_formula("CUMSUM(SHIFT(R4, 1))").unwrap();
/// assert!(parse_formula("CUMSUM(R4").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);

    if formula.trim().is_empty() {
        return Err(FormulaError::Syntax("empty formula".into()));
    }

    let mut parser = FormulaParser::new(formula);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::RightParen => Err(FormulaError::Syntax(
            "unbalanced parentheses: unexpected ')'".into(),
        )),
        token => Err(FormulaError::Syntax(format!(
            "unexpected {} after expression",
            token.describe()
        ))),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Reference(ReferenceKey),
    /// Function name or unrecognised word
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Equal,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    /// Character that starts no token
    Unknown(char),

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Reference(key) => format!("reference '{}'", key),
            Token::Identifier(name) => format!("token '{}'", name),
            Token::Unknown(c) => format!("character '{}'", c),
            Token::Eof => "end of formula".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Equal => "'=='".to_string(),
            Token::LessThan => "'<'".to_string(),
            Token::LessEqual => "'<='".to_string(),
            Token::GreaterThan => "'>'".to_string(),
            Token::GreaterEqual => "'>='".to_string(),
            Token::Comma => "','".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
        }
    }

    fn binary_operator(&self) -> Option<BinaryOperator> {
        let op = match self {
            Token::Plus => BinaryOperator::Add,
            Token::Minus => BinaryOperator::Subtract,
            Token::Star => BinaryOperator::Multiply,
            Token::Slash => BinaryOperator::Divide,
            Token::Caret => BinaryOperator::Power,
            Token::Equal => BinaryOperator::Equal,
            Token::LessThan => BinaryOperator::LessThan,
            Token::LessEqual => BinaryOperator::LessEqual,
            Token::GreaterThan => BinaryOperator::GreaterThan,
            Token::GreaterEqual => BinaryOperator::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }
}

/// Splits formula text into tokens
///
/// Words are scanned greedily, so `R10` is always one token and never `R1`
/// followed by `0`.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub(crate) fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // Comparison operators
        if c == '<' || c == '>' {
            self.advance();
            let or_equal = self.peek_char() == Some('=');
            if or_equal {
                self.advance();
            }
            return match (c, or_equal) {
                ('<', false) => Token::LessThan,
                ('<', true) => Token::LessEqual,
                (_, false) => Token::GreaterThan,
                (_, true) => Token::GreaterEqual,
            };
        }

        if c == '=' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
            }
            return Token::Equal;
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Reference or identifier
        if c.is_ascii_alphabetic() || c == '_' {
            return self.scan_word();
        }

        self.advance();
        Token::Unknown(c)
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_char_at(digit_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Identifier(num_str.to_string()),
        }
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // A word followed by '(' is a function call, even if it looks like a reference
        let mut lookahead = Lexer {
            input: self.input,
            pos: self.pos,
        };
        lookahead.skip_whitespace();
        if lookahead.peek_char() == Some('(') {
            return Token::Identifier(text.to_string());
        }

        match ReferenceKey::parse(text) {
            Ok(key) => Token::Reference(key),
            Err(_) => Token::Identifier(text.to_string()),
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::Eof => None,
            token => Some(token),
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    /// Open parentheses not yet closed
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Self {
            lexer,
            current_token,
            depth: 0,
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current_token, next)
    }

    fn open_paren(&mut self) -> FormulaResult<()> {
        self.expect(&Token::LeftParen)?;
        self.depth += 1;
        Ok(())
    }

    fn close_paren(&mut self) -> FormulaResult<()> {
        match self.current_token() {
            Token::RightParen => {
                self.consume();
                self.depth -= 1;
                Ok(())
            }
            Token::Eof => Err(FormulaError::Syntax(format!(
                "unbalanced parentheses: {} unclosed '('",
                self.depth
            ))),
            token => Err(FormulaError::Syntax(format!(
                "expected ')', got {}",
                token.describe()
            ))),
        }
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Syntax(format!(
                "expected {}, got {}",
                expected.describe(),
                self.current_token().describe()
            )))
        }
    }

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_binary(1)
    }

    /// Precedence climbing over [`BinaryOperator::precedence`]
    ///
    /// Only operators binding at least as tightly as `min_precedence` are
    /// consumed. `^` is right associative; the rest associate left.
    fn parse_binary(&mut self, min_precedence: u8) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.current_token().binary_operator() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.consume();

            let next = if op == BinaryOperator::Power {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_binary(next)?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Signs bind tighter than any binary operator, so `-2^2` is `(-2)^2`
    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume();
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Token::Plus => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),

            Token::Reference(key) => Ok(FormulaExpr::Reference(key)),

            Token::LeftParen => {
                self.depth += 1;
                let expr = self.parse_expression()?;
                self.close_paren()?;
                Ok(expr)
            }

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Syntax(format!("unknown token '{}'", name)))
                }
            }

            Token::RightParen => Err(FormulaError::Syntax(
                "unbalanced parentheses: unexpected ')'".into(),
            )),

            Token::Eof => Err(FormulaError::Syntax("unexpected end of formula".into())),

            token => Err(FormulaError::Syntax(format!(
                "unexpected {}",
                token.describe()
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        let name = name.to_uppercase();
        let def = registry()
            .get(&name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;

        self.open_paren()?;

        let mut args = Vec::new();

        // Parse arguments
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.close_paren()?;

        def.check_arity(args.len())?;

        Ok(FormulaExpr::Function { name, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference(s: &str) -> FormulaExpr {
        FormulaExpr::Reference(ReferenceKey::parse(s).unwrap())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(parse_formula("1e3").unwrap(), FormulaExpr::Number(1000.0));
        assert_eq!(parse_formula(".5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_parse_references() {
        for text in ["V1", "V1.2", "S1.1", "C1.10", "F3.Start", "I2", "L1.2.1", "T.DiM", "M1.2", "R17"] {
            assert_eq!(parse_formula(text).unwrap(), reference(text), "{}", text);
        }
    }

    #[test]
    fn test_longest_token_wins() {
        let ast = parse_formula("R10+R1").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Add,
                left: Box::new(reference("R10")),
                right: Box::new(reference("R1")),
            }
        );
    }

    #[test]
    fn test_parse_precedence() {
        // R4 + (R7 * C1.10)
        let ast = parse_formula("R4 + R7 * C1.10").unwrap();
        if let FormulaExpr::BinaryOp { op, left, right } = ast {
            assert_eq!(op, BinaryOperator::Add);
            assert_eq!(*left, reference("R4"));
            assert!(matches!(
                *right,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }

        // 2^3^2 is 2^(3^2)
        let ast = parse_formula("2^3^2").unwrap();
        if let FormulaExpr::BinaryOp { op, right, .. } = ast {
            assert_eq!(op, BinaryOperator::Power);
            assert!(matches!(
                *right,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Power,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }

        // R1 - R2 - R3 is (R1 - R2) - R3
        let ast = parse_formula("R1 - R2 - R3").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp { op: BinaryOperator::Subtract, ref left, .. }
                if matches!(**left, FormulaExpr::BinaryOp { op: BinaryOperator::Subtract, .. })
        ));

        // -2^2 is (-2)^2
        let ast = parse_formula("-2^2").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp { op: BinaryOperator::Power, ref left, .. }
                if left.as_number() == Some(-2.0)
        ));

        // Comparisons bind loosest
        let ast = parse_formula("R1 + 1 > R2 * 2").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp { op: BinaryOperator::GreaterThan, .. }
        ));
    }

    #[test]
    fn test_parse_comparisons() {
        for (text, op) in [
            ("R1 > 0", BinaryOperator::GreaterThan),
            ("R1 < 0", BinaryOperator::LessThan),
            ("R1 >= 0", BinaryOperator::GreaterEqual),
            ("R1 <= 0", BinaryOperator::LessEqual),
            ("R1 == 0", BinaryOperator::Equal),
        ] {
            let ast = parse_formula(text).unwrap();
            assert!(
                matches!(ast, FormulaExpr::BinaryOp { op: o, .. } if o == op),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_parse_nested_functions() {
        let ast = parse_formula("CUMSUM(SHIFT(R4, 1))").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "CUMSUM");
            assert_eq!(args.len(), 1);
            assert!(matches!(&args[0], FormulaExpr::Function { name, args } if name == "SHIFT" && args.len() == 2));
        } else {
            panic!("Expected Function");
        }
    }

    #[test]
    fn test_function_names_case_insensitive() {
        let ast = parse_formula("cumsum(V1)").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref name, .. } if name == "CUMSUM"));
    }

    #[test]
    fn test_unary() {
        let ast = parse_formula("-R1").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            }
        ));
        assert_eq!(parse_formula("-2").unwrap().as_number(), Some(-2.0));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse_formula("CUMSUM(SHIFT(R4, 1)").unwrap_err();
        assert_eq!(
            err,
            FormulaError::Syntax("unbalanced parentheses: 1 unclosed '('".into())
        );

        let err = parse_formula("((R1 + R2)").unwrap_err();
        assert!(err.to_string().contains("unbalanced"));

        let err = parse_formula("R1 + R2)").unwrap_err();
        assert!(err.to_string().contains("unexpected ')'"));
    }

    #[test]
    fn test_unknown_tokens() {
        assert!(matches!(
            parse_formula("FOO(R1)").unwrap_err(),
            FormulaError::UnknownFunction(name) if name == "FOO"
        ));
        assert!(matches!(
            parse_formula("Additions less disposals").unwrap_err(),
            FormulaError::Syntax(_)
        ));
        assert!(parse_formula("R1 $ R2").is_err());
        assert!(parse_formula("R1 R2").is_err());
        assert!(parse_formula("").is_err());
    }

    #[test]
    fn test_arity_checked() {
        assert!(matches!(
            parse_formula("SHIFT(R1)").unwrap_err(),
            FormulaError::ArgumentCount { .. }
        ));
        assert!(matches!(
            parse_formula("ABS(R1, R2)").unwrap_err(),
            FormulaError::ArgumentCount { .. }
        ));
        assert!(parse_formula("MAX(R1, R2, 0)").is_ok());
    }

    #[test]
    fn test_lexer_iterates_tokens() {
        let tokens: Vec<Token> = Lexer::new("R1+ foo").collect();
        assert_eq!(
            tokens,
            vec![
                Token::Reference(ReferenceKey::parse("R1").unwrap()),
                Token::Plus,
                Token::Identifier("foo".into()),
            ]
        );
    }
}
