//! Expression parser for spreadsheet formulas.
//!
//! A recursive descent parser for the arithmetic subset of the formula
//! language, plus function calls and cell ranges. Formula text is never
//! handed to a general-purpose evaluator: the grammar below is the whole
//! surface, which keeps untrusted spreadsheet content from executing
//! anything.
//!
//! # BNF Grammar
//!
//! ```bnf
//! Expression     ::= Addition
//! Addition       ::= Multiplication ( ( "+" | "-" ) Multiplication )*
//! Multiplication ::= Unary ( ( "*" | "/" ) Unary )*
//! Unary          ::= ( "+" | "-" )? Primary
//! Primary        ::= Number | CellRef | Range | FunctionCall | "(" Expression ")"
//! FunctionCall   ::= Identifier "(" ArgumentList? ")"
//! ArgumentList   ::= Expression ( "," Expression )*
//! Range          ::= CellRef ":" CellRef
//! CellRef        ::= [A-Z]+ [0-9]+
//! Number         ::= [0-9]+ ( "." [0-9]+ )?
//! Identifier     ::= [A-Z][A-Z0-9_]*
//! ```
//!
//! Ranges are only meaningful as function arguments; functions resolve
//! through a [`FunctionRegistry`], of which `SUM` is the sole built-in.
//!
//! Errors split into two families that the evaluator treats differently:
//! [`DomainError::MalformedExpression`]-style failures (dangling
//! operators, unbalanced parentheses, division by zero) surface as the
//! `#ERROR` sentinel, while unrecognized input (stray characters, bare
//! words, unknown functions) falls back to literal display.

use std::collections::HashMap;

use super::errors::{DomainError, DomainResult};
use super::models::{CellAddress, Spreadsheet};

/// Represents a token in the expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    CellRef(String),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Colon,

    // End of input
    Eof,
}

/// Represents an Abstract Syntax Tree node for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    CellRef(String),
    Range(String, String), // start_cell, end_cell

    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Unary operators.
#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Lexical analyzer for tokenizing expressions.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    /// Advances to the next character in the input.
    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Reads a number token (integer or decimal).
    fn read_number(&mut self) -> DomainResult<f64> {
        let mut number_str = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char == Some('.') {
            number_str.push('.');
            self.advance();

            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    number_str.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        number_str
            .parse::<f64>()
            .map_err(|_| DomainError::MalformedExpression(format!("invalid number: {}", number_str)))
    }

    /// Reads an identifier (function name or cell reference).
    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                identifier.push(ch.to_ascii_uppercase());
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    /// Determines if an identifier is a cell reference or function name.
    ///
    /// A cell reference is letters followed by digits (A1, B12, AA7);
    /// anything else is treated as a function name.
    fn classify_identifier(&self, identifier: &str) -> Token {
        let mut has_letters = false;
        let mut has_digits = false;
        let mut letters_first = true;

        for ch in identifier.chars() {
            if ch.is_ascii_alphabetic() {
                if has_digits {
                    letters_first = false;
                }
                has_letters = true;
            } else if ch.is_ascii_digit() {
                has_digits = true;
            } else {
                letters_first = false;
            }
        }

        if has_letters && has_digits && letters_first {
            Token::CellRef(identifier.to_string())
        } else {
            Token::Identifier(identifier.to_string())
        }
    }

    /// Gets the next token from the input.
    pub fn next_token(&mut self) -> DomainResult<Token> {
        self.skip_whitespace();

        match self.current_char {
            None => Ok(Token::Eof),

            Some(ch) => match ch {
                '0'..='9' | '.' => {
                    let number = self.read_number()?;
                    Ok(Token::Number(number))
                }

                'A'..='Z' | 'a'..='z' => {
                    let identifier = self.read_identifier();
                    Ok(self.classify_identifier(&identifier))
                }

                '+' => {
                    self.advance();
                    Ok(Token::Plus)
                }

                '-' => {
                    self.advance();
                    Ok(Token::Minus)
                }

                '*' => {
                    self.advance();
                    Ok(Token::Multiply)
                }

                '/' => {
                    self.advance();
                    Ok(Token::Divide)
                }

                '(' => {
                    self.advance();
                    Ok(Token::LeftParen)
                }

                ')' => {
                    self.advance();
                    Ok(Token::RightParen)
                }

                ',' => {
                    self.advance();
                    Ok(Token::Comma)
                }

                ':' => {
                    self.advance();
                    Ok(Token::Colon)
                }

                _ => Err(DomainError::UnrecognizedSyntax(ch.to_string())),
            },
        }
    }
}

/// Function signature for built-in functions.
pub type FunctionImpl = fn(&[f64]) -> DomainResult<f64>;

/// Registry for spreadsheet functions.
///
/// `SUM` is the only built-in; unknown names surface as
/// [`DomainError::UnknownFunction`], which the formula evaluator turns
/// into literal fallback rather than an error cell.
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionImpl>,
}

impl FunctionRegistry {
    /// Creates a new function registry with built-in functions.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_function("SUM", |args| Ok(args.iter().sum()));
        registry
    }

    /// Registers a function under a case-insensitive name.
    pub fn register_function(&mut self, name: &str, func: FunctionImpl) {
        self.functions.insert(name.to_uppercase(), func);
    }

    /// Gets a function by name.
    pub fn get_function(&self, name: &str) -> Option<&FunctionImpl> {
        self.functions.get(&name.to_uppercase())
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive descent parser for spreadsheet expressions.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    /// Creates a new parser for the given expression.
    pub fn new(input: &str) -> DomainResult<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
        })
    }

    /// Advances to the next token.
    fn advance(&mut self) -> DomainResult<()> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    /// Checks if the current token matches the expected token and advances.
    fn expect(&mut self, expected: Token) -> DomainResult<()> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else {
            Err(DomainError::MalformedExpression(format!(
                "expected {:?}, found {:?}",
                expected, self.current_token
            )))
        }
    }

    /// Parses the top-level expression.
    pub fn parse(&mut self) -> DomainResult<Expr> {
        let expr = self.parse_addition()?;

        if self.current_token != Token::Eof {
            return Err(DomainError::MalformedExpression(format!(
                "unexpected token at end: {:?}",
                self.current_token
            )));
        }

        Ok(expr)
    }

    /// Parses addition and subtraction expressions.
    fn parse_addition(&mut self) -> DomainResult<Expr> {
        let mut left = self.parse_multiplication()?;

        while matches!(self.current_token, Token::Plus | Token::Minus) {
            let op = match self.current_token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => unreachable!(),
            };
            self.advance()?;
            let right = self.parse_multiplication()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses multiplication and division expressions.
    fn parse_multiplication(&mut self) -> DomainResult<Expr> {
        let mut left = self.parse_unary()?;

        while matches!(self.current_token, Token::Multiply | Token::Divide) {
            let op = match self.current_token {
                Token::Multiply => BinaryOp::Multiply,
                Token::Divide => BinaryOp::Divide,
                _ => unreachable!(),
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses unary expressions.
    fn parse_unary(&mut self) -> DomainResult<Expr> {
        match self.current_token {
            Token::Plus => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    operator: UnaryOp::Plus,
                    operand: Box::new(operand),
                })
            }
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    operator: UnaryOp::Minus,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    /// Parses primary expressions (highest precedence).
    fn parse_primary(&mut self) -> DomainResult<Expr> {
        match &self.current_token {
            Token::Number(value) => {
                let value = *value;
                self.advance()?;
                Ok(Expr::Number(value))
            }

            Token::CellRef(cell) => {
                let cell = cell.clone();
                self.advance()?;

                // Check if this is the start of a range
                if self.current_token == Token::Colon {
                    self.advance()?;
                    if let Token::CellRef(end_cell) = &self.current_token {
                        let end_cell = end_cell.clone();
                        self.advance()?;
                        Ok(Expr::Range(cell, end_cell))
                    } else {
                        Err(DomainError::MalformedExpression(
                            "expected cell reference after ':'".to_string(),
                        ))
                    }
                } else {
                    Ok(Expr::CellRef(cell))
                }
            }

            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;

                // A bare word without an argument list is not a formula
                // construct at all; let the caller fall back to literal
                // display.
                if self.current_token == Token::LeftParen {
                    self.advance()?;
                    let args = self.parse_argument_list()?;
                    self.expect(Token::RightParen)?;
                    Ok(Expr::FunctionCall { name, args })
                } else {
                    Err(DomainError::UnrecognizedSyntax(name))
                }
            }

            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_addition()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            _ => Err(DomainError::MalformedExpression(format!(
                "unexpected token: {:?}",
                self.current_token
            ))),
        }
    }

    /// Parses function argument lists.
    fn parse_argument_list(&mut self) -> DomainResult<Vec<Expr>> {
        let mut args = Vec::new();

        if self.current_token == Token::RightParen {
            return Ok(args);
        }

        args.push(self.parse_addition()?);

        while self.current_token == Token::Comma {
            self.advance()?;
            args.push(self.parse_addition()?);
        }

        Ok(args)
    }
}

/// Expression evaluator that walks the AST and computes results.
pub struct ExpressionEvaluator<'a> {
    spreadsheet: &'a Spreadsheet,
    function_registry: &'a FunctionRegistry,
}

impl<'a> ExpressionEvaluator<'a> {
    /// Creates a new expression evaluator.
    pub fn new(spreadsheet: &'a Spreadsheet, function_registry: &'a FunctionRegistry) -> Self {
        Self {
            spreadsheet,
            function_registry,
        }
    }

    /// Evaluates an expression AST to a numeric result.
    ///
    /// Cell references read the referenced cell's current display value
    /// with permissive coercion; empty, non-numeric, and out-of-grid
    /// references all contribute 0 rather than failing.
    pub fn evaluate(&self, expr: &Expr) -> DomainResult<f64> {
        match expr {
            Expr::Number(value) => Ok(*value),

            Expr::CellRef(cell_ref) => {
                // Unrepresentable references (row 0, columns past what
                // fits in an index) read like any other out-of-grid
                // cell: as 0, never a failure
                Ok(CellAddress::parse(cell_ref)
                    .map(|addr| self.spreadsheet.numeric_value(addr))
                    .unwrap_or(0.0))
            }

            Expr::Range(start_cell, end_cell) => {
                // Ranges only make sense as function arguments
                Err(DomainError::UnrecognizedSyntax(format!(
                    "{}:{}",
                    start_cell, end_cell
                )))
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;

                match operator {
                    BinaryOp::Add => Ok(left_val + right_val),
                    BinaryOp::Subtract => Ok(left_val - right_val),
                    BinaryOp::Multiply => Ok(left_val * right_val),
                    BinaryOp::Divide => {
                        if right_val == 0.0 {
                            Err(DomainError::DivisionByZero)
                        } else {
                            Ok(left_val / right_val)
                        }
                    }
                }
            }

            Expr::Unary { operator, operand } => {
                let operand_val = self.evaluate(operand)?;

                match operator {
                    UnaryOp::Plus => Ok(operand_val),
                    UnaryOp::Minus => Ok(-operand_val),
                }
            }

            Expr::FunctionCall { name, args } => {
                let func = self
                    .function_registry
                    .get_function(name)
                    .ok_or_else(|| DomainError::UnknownFunction(name.clone()))?;

                let arg_values = self.evaluate_function_args(args)?;
                func(&arg_values)
            }
        }
    }

    /// Evaluates function arguments, expanding ranges into the values of
    /// every cell in the rectangle spanned by the two corners.
    ///
    /// Corners may come in either order on both axes; the rectangle is
    /// min/max-normalized and clamped to the grid.
    fn evaluate_function_args(&self, args: &[Expr]) -> DomainResult<Vec<f64>> {
        let mut values = Vec::new();

        for arg in args {
            match arg {
                Expr::Range(start_cell, end_cell) => {
                    // A corner that cannot be represented spans no cells
                    let (Some(start), Some(end)) =
                        (CellAddress::parse(start_cell), CellAddress::parse(end_cell))
                    else {
                        continue;
                    };

                    let top = start.row.min(end.row);
                    let bottom = start.row.max(end.row).min(self.spreadsheet.rows - 1);
                    let left = start.col.min(end.col);
                    let right = start.col.max(end.col).min(self.spreadsheet.cols - 1);

                    for row in top..=bottom {
                        for col in left..=right {
                            values.push(self.spreadsheet.numeric_value(CellAddress::new(row, col)));
                        }
                    }
                }
                _ => {
                    values.push(self.evaluate(arg)?);
                }
            }
        }

        Ok(values)
    }
}
