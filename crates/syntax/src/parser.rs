//! Token stream to [`Module`] parser.

use crate::{
    ast::*,
    diagnostic::{Diagnostic, Span},
    lexer::{Token, tokenize, unescape, unescape_bytes},
};
use alloy_primitives::U256;
use chumsky::{extra, input::IterInput, prelude::*};

type TokenInput = IterInput<std::vec::IntoIter<(Token, Span)>, Span>;
type ParserError<'src> = extra::Err<Rich<'src, Token, Span>>;

pub fn parse_module(source: &str) -> Result<Module<'_>, Diagnostic> {
    let tokens = tokenize(source)?;
    tracing::trace!(tokens = tokens.len(), "tokenized source");
    let eoi = source.len()..source.len();
    let input = IterInput::new(tokens.into_iter(), eoi.clone());

    module_parser(source).parse(input).into_result().map_err(|errors| {
        match errors.into_iter().next() {
            Some(error) => Diagnostic::syntax(error.reason().to_string(), error.span().clone()),
            None => Diagnostic::syntax("invalid syntax", eoi),
        }
    })
}

/// Parses a standalone expression, used for type annotations given outside of source files.
pub fn parse_expr(source: &str) -> Result<Expr<'_>, Diagnostic> {
    let tokens = tokenize(source)?;
    let eoi = source.len()..source.len();
    let input = IterInput::new(tokens.into_iter(), eoi.clone());

    expr_parser(source)
        .then_ignore(just(Token::Newline).or_not())
        .then_ignore(end())
        .parse(input)
        .into_result()
        .map_err(|errors| match errors.into_iter().next() {
            Some(error) => Diagnostic::syntax(error.reason().to_string(), error.span().clone()),
            None => Diagnostic::syntax("invalid syntax", eoi),
        })
}

fn ident<'src>(
    source: &'src str,
) -> impl Parser<'src, TokenInput, Ident<'src>, ParserError<'src>> + Clone {
    just(Token::Name).map_with(move |_, e| {
        let span: Span = e.span();
        Spanned::new(&source[span.clone()], span)
    })
}

fn binop<'src>(op: BinOp, left: Expr<'src>, right: Expr<'src>) -> Expr<'src> {
    let span = left.span.start..right.span.end;
    Expr::new(ExprKind::BinOp { op, left: Box::new(left), right: Box::new(right) }, span)
}

fn binary_level<'src, P, O>(
    operand: P,
    op: O,
) -> impl Parser<'src, TokenInput, Expr<'src>, ParserError<'src>> + Clone
where
    P: Parser<'src, TokenInput, Expr<'src>, ParserError<'src>> + Clone,
    O: Parser<'src, TokenInput, BinOp, ParserError<'src>> + Clone,
{
    operand
        .clone()
        .foldl(op.then(operand).repeated(), |left, (op, right)| binop(op, left, right))
}

#[derive(Clone)]
enum Argument<'src> {
    Positional(Expr<'src>),
    Keyword(Keyword<'src>),
}

type CallArguments<'src> = (Vec<Expr<'src>>, Vec<Keyword<'src>>);

/// Argument order is not enforced here; the structure validator reports positional arguments
/// that follow keywords by comparing spans.
fn split_arguments(arguments: Vec<Argument<'_>>) -> CallArguments<'_> {
    let mut positional = Vec::with_capacity(arguments.len());
    let mut keywords = Vec::new();
    for argument in arguments {
        match argument {
            Argument::Positional(expr) => positional.push(expr),
            Argument::Keyword(keyword) => keywords.push(keyword),
        }
    }
    (positional, keywords)
}

#[derive(Clone)]
enum Postfix<'src> {
    Call(CallArguments<'src>),
    Attribute(Ident<'src>),
    Index(Expr<'src>),
}

fn expr_parser<'src>(
    source: &'src str,
) -> impl Parser<'src, TokenInput, Expr<'src>, ParserError<'src>> + Clone {
    recursive(move |expr| {
        let int = just(Token::Int).try_map_with(move |_, e| {
            let span: Span = e.span();
            let digits: String = source[span.clone()].chars().filter(|c| *c != '_').collect();
            match digits.parse::<U256>() {
                Ok(value) => Ok(Expr::new(ExprKind::Int(value), span)),
                Err(_) => Err(Rich::custom(span, "integer literal does not fit into 256 bits")),
            }
        });

        let hex = just(Token::Hex).map_with(move |_, e| {
            let span: Span = e.span();
            Expr::new(ExprKind::Hex(&source[span.start + 2..span.end]), span)
        });

        let string = just(Token::Str).try_map_with(move |_, e| {
            let span: Span = e.span();
            match unescape(&source[span.clone()]) {
                Ok(value) => Ok(Expr::new(ExprKind::Str(value), span)),
                Err(message) => Err(Rich::custom(span, message)),
            }
        });

        let bytes = just(Token::ByteStr).try_map_with(move |_, e| {
            let span: Span = e.span();
            match unescape_bytes(&source[span.clone()]) {
                Ok(value) => Ok(Expr::new(ExprKind::Bytes(value), span)),
                Err(message) => Err(Rich::custom(span, message)),
            }
        });

        let boolean = choice((just(Token::True).to(true), just(Token::False).to(false)))
            .map_with(|value, e| Expr::new(ExprKind::Bool(value), e.span()));

        let name = ident(source).map(|id| Expr::new(ExprKind::Name(id.inner), id.span));

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LeftBracket), just(Token::RightBracket))
            .map_with(|items, e| Expr::new(ExprKind::List(items), e.span()));

        let dict = expr
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LeftBrace), just(Token::RightBrace))
            .map_with(|entries, e| Expr::new(ExprKind::Dict(entries), e.span()));

        let parens =
            expr.clone().delimited_by(just(Token::LeftParen), just(Token::RightParen));

        let atom = choice((int, hex, string, bytes, boolean, name, list, dict, parens)).boxed();

        let argument = choice((
            ident(source)
                .then_ignore(just(Token::Equals))
                .then(expr.clone())
                .map(|(name, value)| Argument::Keyword(Keyword { name, value })),
            expr.clone().map(Argument::Positional),
        ));
        let call_arguments = argument
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LeftParen), just(Token::RightParen))
            .map(split_arguments);

        let slice = expr
            .clone()
            .or_not()
            .then_ignore(just(Token::Colon))
            .then(expr.clone().or_not())
            .map_with(|(lower, upper), e| {
                let kind = ExprKind::Slice { lower: lower.map(Box::new), upper: upper.map(Box::new) };
                Expr::new(kind, e.span())
            });
        let index_list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|mut items, e| {
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Expr::new(ExprKind::Tuple(items), e.span())
                }
            });
        let index = choice((slice, index_list))
            .delimited_by(just(Token::LeftBracket), just(Token::RightBracket));

        let postfix_op = choice((
            call_arguments.map(Postfix::Call),
            just(Token::Dot).ignore_then(ident(source)).map(Postfix::Attribute),
            index.map(Postfix::Index),
        ))
        .map_with(|op, e| (op, e.span()));

        let postfix = atom
            .foldl(postfix_op.repeated(), |value, (op, op_span): (Postfix<'src>, Span)| {
                let span = value.span.start..op_span.end;
                let value = Box::new(value);
                let kind = match op {
                    Postfix::Call((args, keywords)) => ExprKind::Call { func: value, args, keywords },
                    Postfix::Attribute(attr) => ExprKind::Attribute { value, attr },
                    Postfix::Index(index) => {
                        ExprKind::Subscript { value, index: Box::new(index) }
                    }
                };
                Expr::new(kind, span)
            })
            .boxed();

        let power = binary_level(postfix, just(Token::StarStar).to(BinOp::Pow)).boxed();

        let unary = choice((just(Token::Minus).to(UnaryOp::Neg), just(Token::Tilde).to(UnaryOp::Invert)))
            .map_with(|op, e| (op, e.span()))
            .repeated()
            .foldr(power, |(op, op_span): (UnaryOp, Span), operand: Expr<'src>| {
                let span = op_span.start..operand.span.end;
                Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, span)
            })
            .boxed();

        let product = binary_level(
            unary,
            choice((
                just(Token::Star).to(BinOp::Mul),
                just(Token::Slash).to(BinOp::Div),
                just(Token::Percent).to(BinOp::Mod),
            )),
        )
        .boxed();
        let sum = binary_level(
            product,
            choice((just(Token::Plus).to(BinOp::Add), just(Token::Minus).to(BinOp::Sub))),
        )
        .boxed();
        let shift = binary_level(
            sum,
            choice((
                just(Token::ShiftLeft).to(BinOp::Shl),
                just(Token::ShiftRight).to(BinOp::Shr),
            )),
        )
        .boxed();
        let bit_and = binary_level(shift, just(Token::Amp).to(BinOp::BitAnd)).boxed();
        let bit_xor = binary_level(bit_and, just(Token::Caret).to(BinOp::BitXor)).boxed();
        let bit_or = binary_level(bit_xor, just(Token::Pipe).to(BinOp::BitOr)).boxed();

        let compare_op = choice((
            just(Token::EqEq).to(CmpOp::Eq),
            just(Token::NotEq).to(CmpOp::NotEq),
            just(Token::LessEq).to(CmpOp::LtEq),
            just(Token::Less).to(CmpOp::Lt),
            just(Token::GreaterEq).to(CmpOp::GtEq),
            just(Token::Greater).to(CmpOp::Gt),
        ));
        let comparison = bit_or
            .clone()
            .then(compare_op.then(bit_or).or_not())
            .map(|(left, rest)| match rest {
                Some((op, right)) => {
                    let span = left.span.start..right.span.end;
                    let kind =
                        ExprKind::Compare { op, left: Box::new(left), right: Box::new(right) };
                    Expr::new(kind, span)
                }
                None => left,
            })
            .boxed();

        let negation = just(Token::Not)
            .map_with(|_, e| e.span())
            .repeated()
            .foldr(comparison, |not_span: Span, operand: Expr<'src>| {
                let span = not_span.start..operand.span.end;
                Expr::new(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, span)
            })
            .boxed();

        let bool_level = |operand: Boxed<'src, 'src, TokenInput, Expr<'src>, ParserError<'src>>,
                          token: Token,
                          op: BoolOp| {
            operand.clone().foldl(just(token).ignore_then(operand).repeated(), move |left, right| {
                let span = left.span.start..right.span.end;
                Expr::new(ExprKind::BoolOp { op, left: Box::new(left), right: Box::new(right) }, span)
            })
        };
        let conjunction = bool_level(negation, Token::And, BoolOp::And).boxed();
        bool_level(conjunction, Token::Or, BoolOp::Or).boxed()
    })
}

#[derive(Clone)]
enum StmtTail<'src> {
    Annotated(Expr<'src>, Option<Expr<'src>>),
    Assign(Expr<'src>, Vec<Expr<'src>>),
    Augmented(BinOp, Expr<'src>),
    Bare,
}

fn stmt_parser<'src>(
    source: &'src str,
) -> impl Parser<'src, TokenInput, Stmt<'src>, ParserError<'src>> + Clone {
    let expr = expr_parser(source).boxed();

    recursive(move |stmt| {
        let augmented_op = choice((
            just(Token::PlusEquals).to(BinOp::Add),
            just(Token::MinusEquals).to(BinOp::Sub),
            just(Token::StarEquals).to(BinOp::Mul),
            just(Token::SlashEquals).to(BinOp::Div),
            just(Token::PercentEquals).to(BinOp::Mod),
        ));

        let expr_led = expr
            .clone()
            .then(choice((
                just(Token::Colon)
                    .ignore_then(expr.clone())
                    .then(just(Token::Equals).ignore_then(expr.clone()).or_not())
                    .map(|(annotation, value)| StmtTail::Annotated(annotation, value)),
                just(Token::Equals)
                    .ignore_then(expr.clone())
                    .then(just(Token::Equals).ignore_then(expr.clone()).repeated().collect::<Vec<_>>())
                    .map(|(second, rest)| StmtTail::Assign(second, rest)),
                augmented_op.then(expr.clone()).map(|(op, value)| StmtTail::Augmented(op, value)),
                empty().to(StmtTail::Bare),
            )))
            .map(|(first, tail)| match tail {
                StmtTail::Annotated(annotation, value) => {
                    StmtKind::AnnAssign { target: first, annotation, value }
                }
                StmtTail::Assign(second, rest) => {
                    let mut targets = vec![first];
                    let mut value = second;
                    for next in rest {
                        targets.push(std::mem::replace(&mut value, next));
                    }
                    StmtKind::Assign { targets, value }
                }
                StmtTail::Augmented(op, value) => StmtKind::AugAssign { target: first, op, value },
                StmtTail::Bare => StmtKind::Expr(first),
            });

        let simple = choice((
            just(Token::Pass).to(StmtKind::Pass),
            just(Token::Break).to(StmtKind::Break),
            just(Token::Continue).to(StmtKind::Continue),
            just(Token::Return).ignore_then(expr.clone().or_not()).map(StmtKind::Return),
            just(Token::Assert)
                .ignore_then(expr.clone())
                .then(just(Token::Comma).ignore_then(expr.clone()).or_not())
                .map(|(test, msg)| StmtKind::Assert { test, msg }),
            just(Token::Raise).ignore_then(expr.clone().or_not()).map(StmtKind::Raise),
            just(Token::Log).ignore_then(expr.clone()).map(StmtKind::Log),
            expr_led,
        ))
        .map_with(|kind, e| Stmt { kind, span: e.span() })
        .then_ignore(just(Token::Newline))
        .boxed();

        let block = choice((
            just(Token::Newline)
                .ignore_then(just(Token::Indent))
                .ignore_then(stmt.clone().repeated().at_least(1).collect::<Vec<_>>())
                .then_ignore(just(Token::Dedent)),
            simple.clone().map(|stmt| vec![stmt]),
        ))
        .boxed();

        let if_stmt = just(Token::If)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(block.clone())
            .then(
                just(Token::Elif)
                    .map_with(|_, e| e.span())
                    .then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(block.clone())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then(just(Token::Else).ignore_then(just(Token::Colon)).ignore_then(block.clone()).or_not())
            .map_with(|(((test, body), elifs), orelse), e| {
                let span: Span = e.span();
                let mut orelse = orelse.unwrap_or_default();
                for ((elif_span, test), body) in elifs.into_iter().rev() {
                    let kind = StmtKind::If { test, body, orelse };
                    orelse = vec![Stmt { kind, span: elif_span.start..span.end }];
                }
                Stmt { kind: StmtKind::If { test, body, orelse }, span }
            });

        let for_stmt = just(Token::For)
            .ignore_then(ident(source))
            .then(just(Token::Colon).ignore_then(expr.clone()).or_not())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(block.clone())
            .then(just(Token::Else).ignore_then(just(Token::Colon)).ignore_then(block.clone()).or_not())
            .map_with(|((((target, annotation), iter), body), orelse), e| Stmt {
                kind: StmtKind::For { target, annotation, iter, body, orelse },
                span: e.span(),
            });

        let while_stmt = just(Token::While)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(block)
            .map_with(|(test, body), e| Stmt { kind: StmtKind::While { test, body }, span: e.span() });

        choice((if_stmt, for_stmt, while_stmt, simple))
    })
}

fn module_parser<'src>(
    source: &'src str,
) -> impl Parser<'src, TokenInput, Module<'src>, ParserError<'src>> + Clone {
    let expr = expr_parser(source).boxed();
    let stmt = stmt_parser(source).boxed();
    let name = ident(source);

    let body = just(Token::Newline)
        .ignore_then(just(Token::Indent))
        .ignore_then(stmt.repeated().at_least(1).collect::<Vec<_>>())
        .then_ignore(just(Token::Dedent));

    let param = name
        .clone()
        .then_ignore(just(Token::Colon))
        .then(expr.clone())
        .then(just(Token::Equals).ignore_then(expr.clone()).or_not())
        .map_with(|((name, annotation), default), e| Param {
            name,
            annotation,
            default,
            span: e.span(),
        });
    let params = param
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LeftParen), just(Token::RightParen))
        .boxed();
    let returns = just(Token::ThinArrow).ignore_then(expr.clone()).or_not();

    let decorator = just(Token::At).ignore_then(expr.clone()).then_ignore(just(Token::Newline));
    let function = decorator
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Def))
        .then(name.clone())
        .then(params.clone())
        .then(returns.clone())
        .then_ignore(just(Token::Colon))
        .then(body)
        .map_with(|((((decorators, name), params), returns), body), e| {
            Item::Function(FunctionDef { decorators, name, params, returns, body, span: e.span() })
        });

    let field = name
        .clone()
        .then_ignore(just(Token::Colon))
        .then(expr.clone())
        .then_ignore(just(Token::Newline))
        .map(|(name, annotation)| Field { name, annotation });
    let fields = just(Token::Newline)
        .ignore_then(just(Token::Indent))
        .ignore_then(choice((
            field.repeated().at_least(1).collect::<Vec<_>>(),
            just(Token::Pass).then(just(Token::Newline)).to(Vec::new()),
        )))
        .then_ignore(just(Token::Dedent))
        .boxed();

    let struct_def = just(Token::Struct)
        .ignore_then(name.clone())
        .then_ignore(just(Token::Colon))
        .then(fields.clone())
        .map_with(|(name, fields), e| Item::Struct(StructDef { name, fields, span: e.span() }));

    let event_def = name
        .clone()
        .filter(|keyword| keyword.inner == "event")
        .ignore_then(name.clone())
        .then_ignore(just(Token::Colon))
        .then(fields)
        .map_with(|(name, fields), e| Item::Event(EventDef { name, fields, span: e.span() }));

    let interface_function = just(Token::Def)
        .ignore_then(name.clone())
        .then(params)
        .then(returns)
        .then_ignore(just(Token::Colon))
        .then(name.clone())
        .then_ignore(just(Token::Newline))
        .map_with(|(((name, params), returns), mutability), e| InterfaceFunction {
            name,
            params,
            returns,
            mutability,
            span: e.span(),
        });
    let interface_def = just(Token::Interface)
        .ignore_then(name.clone())
        .then_ignore(just(Token::Colon))
        .then_ignore(just(Token::Newline))
        .then_ignore(just(Token::Indent))
        .then(interface_function.repeated().at_least(1).collect::<Vec<_>>())
        .then_ignore(just(Token::Dedent))
        .map_with(|(name, functions), e| {
            Item::Interface(InterfaceDef { name, functions, span: e.span() })
        });

    let variable = name
        .then_ignore(just(Token::Colon))
        .then(expr.clone())
        .then(just(Token::Equals).ignore_then(expr).or_not())
        .map_with(|((name, annotation), value), e| {
            Item::Variable(VariableDecl { name, annotation, value, span: e.span() })
        })
        .then_ignore(just(Token::Newline));

    // Module docstrings are dropped.
    let docstring = just(Token::Str).then(just(Token::Newline)).ignored();

    choice((
        function.map(Some),
        struct_def.map(Some),
        interface_def.map(Some),
        event_def.map(Some),
        variable.map(Some),
        docstring.to(None),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
    .map(|items| Module { items: items.into_iter().flatten().collect() })
}
