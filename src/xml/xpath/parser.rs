//! Recursive-descent parser producing the XPath expression tree.

use super::XPathError;
use super::lexer::{NameTestToken, Spanned, Token, tokenize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Attribute,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "attribute" => Axis::Attribute,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Any,
    AnyInNamespace(String),
    Name(Option<String>, String),
    Node,
    Text,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

pub(crate) type Steps = SmallVec<[Step; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    /// Location path from the context node, or from the root when `absolute`.
    Path { absolute: bool, steps: Steps },
    /// Primary expression with predicates and an optional trailing path.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Steps,
    },
}

pub(crate) fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(XPathError::syntax(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(XPathError::syntax(
            extra.offset,
            format!("unexpected token {:?}", extra.token),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), XPathError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(XPathError::syntax(self.offset(), format!("expected {}", what)))
        }
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, XPathError>,
        ops: &[(Token, BinaryOp)],
    ) -> Result<Expr, XPathError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(Self::parse_and, &[(Token::Or, BinaryOp::Or)])
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(Self::parse_equality, &[(Token::And, BinaryOp::And)])
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            Self::parse_relational,
            &[(Token::Eq, BinaryOp::Eq), (Token::NotEq, BinaryOp::NotEq)],
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            Self::parse_additive,
            &[
                (Token::Le, BinaryOp::Le),
                (Token::Lt, BinaryOp::Lt),
                (Token::Ge, BinaryOp::Ge),
                (Token::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            Self::parse_multiplicative,
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            Self::parse_unary,
            &[
                (Token::Multiply, BinaryOp::Mul),
                (Token::Div, BinaryOp::Div),
                (Token::Mod, BinaryOp::Mod),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.binary_level(Self::parse_path_expr, &[(Token::Pipe, BinaryOp::Union)])
    }

    fn parse_path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.parse_relative_path()?
                } else {
                    Steps::new()
                };
                Ok(Expr::Path { absolute: true, steps })
            },
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = Steps::new();
                steps.push(descendant_or_self_step());
                steps.extend(self.parse_relative_path()?);
                Ok(Expr::Path { absolute: true, steps })
            },
            _ if self.starts_step() => {
                let steps = self.parse_relative_path()?;
                Ok(Expr::Path { absolute: false, steps })
            },
            _ => self.parse_filter_expr(),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::AxisName(_)
                    | Token::NameTest(_)
                    | Token::NodeType(_)
            )
        )
    }

    fn parse_filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Steps::new();
        loop {
            if self.eat(&Token::Slash) {
                steps.extend(self.parse_relative_path()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self_step());
                steps.extend(self.parse_relative_path()?);
            } else {
                break;
            }
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            },
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::FunctionName(name)) => {
                self.expect(Token::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen, "',' or ')'")?;
                        break;
                    }
                }
                Ok(Expr::Function(name, args))
            },
            Some(Token::Variable(name)) => Err(XPathError::UnsupportedVariable(name)),
            Some(other) => Err(XPathError::syntax(offset, format!("unexpected token {:?}", other))),
            None => Err(XPathError::syntax(offset, "unexpected end of expression")),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket, "']'")?;
        }
        Ok(predicates)
    }

    fn parse_relative_path(&mut self) -> Result<Steps, XPathError> {
        let mut steps = Steps::new();
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self_step());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek() {
            let offset = self.offset();
            let axis = Axis::from_name(name)
                .ok_or_else(|| XPathError::syntax(offset, format!("unknown axis '{}'", name)))?;
            self.pos += 1;
            self.expect(Token::DoubleColon, "'::'")?;
            axis
        } else {
            Axis::Child
        };

        let offset = self.offset();
        let test = match self.advance() {
            Some(Token::NameTest(NameTestToken::Any)) => NodeTest::Any,
            Some(Token::NameTest(NameTestToken::AnyInNamespace(p))) => NodeTest::AnyInNamespace(p),
            Some(Token::NameTest(NameTestToken::Name(p, l))) => NodeTest::Name(p, l),
            Some(Token::NodeType(kind)) => {
                self.expect(Token::LParen, "'('")?;
                // processing-instruction('target') literal is accepted and ignored
                if kind == "processing-instruction"
                    && let Some(Token::Literal(_)) = self.peek()
                {
                    self.pos += 1;
                }
                self.expect(Token::RParen, "')'")?;
                match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::ProcessingInstruction,
                }
            },
            _ => return Err(XPathError::syntax(offset, "expected a node test")),
        };

        let predicates = self.parse_predicates()?;
        Ok(Step { axis, test, predicates })
    }
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_abbreviated_path() {
        let expr = parse("//p:sp[1]/p:txBody").unwrap();
        let Expr::Path { absolute, steps } = expr else {
            panic!("expected a path");
        };
        assert!(absolute);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].axis, Axis::DescendantOrSelf);
        assert_eq!(steps[1].test, NodeTest::Name(Some("p".into()), "sp".into()));
        assert_eq!(steps[1].predicates, vec![Expr::Number(1.0)]);
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Binary(BinaryOp::Or, left, _) = expr else {
            panic!("or binds loosest");
        };
        assert!(matches!(*left, Expr::Binary(BinaryOp::Eq, _, _)));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("//a:p["), Err(XPathError::Syntax { .. })));
        assert!(matches!(parse("/a/"), Err(XPathError::Syntax { offset: 3, .. })));
        assert!(matches!(parse("bogus::a"), Err(XPathError::Syntax { offset: 0, .. })));
        assert!(matches!(parse("$v"), Err(XPathError::UnsupportedVariable(_))));
        assert!(matches!(parse(""), Err(XPathError::Syntax { offset: 0, .. })));
    }

    #[test]
    fn test_root_only() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                absolute: true,
                steps: Steps::new()
            }
        );
    }
}
