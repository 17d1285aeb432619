// Expression parser - converts expression bodies into an AST
// Supports: numbers, identifiers, function calls, + - * / ^, unary minus,
// parentheses and implicit multiplication (2x, 3(x+1), 5 m)

use std::collections::BTreeSet;

use super::functions::is_known_function;
use super::lexer::{tokenize, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Variable, constant or unit (resolved at evaluation time)
    Ident(String),
    Neg(Box<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Expr {
    /// Names referenced as plain identifiers (function names excluded).
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ident(name) => {
                names.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_identifiers(names),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(names);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
        }
    }
}

/// Deepest nesting of parentheses, call arguments, signs and exponents.
pub const MAX_NESTING: usize = 256;

/// Parse an expression body into an AST.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    let (expr, pos) = parse_add_sub(&tokens, 0, 0)?;
    if pos < tokens.len() {
        return Err(match &tokens[pos] {
            Token::RParen => "Unbalanced closing parenthesis".to_string(),
            _ => format!("Unexpected token at position {}", pos),
        });
    }
    Ok(expr)
}

fn parse_add_sub(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    check_depth(depth)?;
    let (mut left, mut pos) = parse_mul_div(tokens, pos, depth)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1, depth)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos, depth)?;

    while pos < tokens.len() {
        let (op, next) = match &tokens[pos] {
            Token::Star => (Op::Mul, pos + 1),
            Token::Slash => (Op::Div, pos + 1),
            // Implicit multiplication: an operand directly follows an operand
            t if t.starts_operand() => (Op::Mul, pos),
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, next, depth)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    check_depth(depth)?;
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (expr, pos) = parse_unary(tokens, pos + 1, depth + 1)?;
            Ok((Expr::Neg(Box::new(expr)), pos))
        }
        // Unary plus is a no-op
        Some(Token::Plus) => parse_unary(tokens, pos + 1, depth + 1),
        _ => parse_power(tokens, pos, depth),
    }
}

fn parse_power(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (base, pos) = parse_primary(tokens, pos, depth)?;

    if let Some(Token::Caret) = tokens.get(pos) {
        // Right-associative; the exponent may carry its own sign (2^-1)
        let (exponent, new_pos) = parse_unary(tokens, pos + 1, depth + 1)?;
        return Ok((
            Expr::BinaryOp {
                op: Op::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            new_pos,
        ));
    }

    Ok((base, pos))
}

fn parse_primary(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::Ident(name) => {
            // Only known functions take call syntax; `a(b+c)` is a*(b+c)
            if is_known_function(name) {
                if let Some(Token::LParen) = tokens.get(pos + 1) {
                    let (args, new_pos) = parse_function_args(tokens, pos + 2, depth + 1)?;
                    return Ok((
                        Expr::Function {
                            name: name.clone(),
                            args,
                        },
                        new_pos,
                    ));
                }
                return Err(format!("Function {} requires arguments", name));
            }
            Ok((Expr::Ident(name.clone()), pos + 1))
        }
        Token::LParen => {
            let (expr, pos) = parse_add_sub(tokens, pos + 1, depth + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                Some(_) => Err("Expected closing parenthesis".to_string()),
                None => Err("Missing closing parenthesis".to_string()),
            }
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

fn parse_function_args(
    tokens: &[Token],
    pos: usize,
    depth: usize,
) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();
    let mut pos = pos;

    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((args, pos + 1));
    }

    loop {
        let (arg, new_pos) = parse_add_sub(tokens, pos, depth)?;
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(Token::Comma) => pos += 1,
            Some(_) => return Err("Expected comma or closing parenthesis".to_string()),
            None => return Err("Missing closing parenthesis in function call".to_string()),
        }
    }
}

fn check_depth(depth: usize) -> Result<(), String> {
    if depth > MAX_NESTING {
        return Err("expression nested too deeply".to_string());
    }
    Ok(())
}
