use super::core::{ParseError, ParseResult, Parser, record_failure, record_rejection};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

/// Matches one input element equal to `value`.
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => {
                record_failure(pos);
                Err(ParseError::Unexpected {
                    expected: self.value.to_string(),
                    found: found.to_string(),
                    position: pos,
                })
            }
            None => {
                record_failure(pos);
                Err(ParseError::EOF)
            }
        }
    }
}

/// Always succeeds with `value` without consuming input.
#[derive(Clone)]
pub struct Zero<I, O> {
    value: O,
    _phantom: PhantomData<I>,
}

impl<I, O> Zero<I, O> {
    pub fn new(value: O) -> Self {
        Self {
            value,
            _phantom: PhantomData,
        }
    }
}

impl<I, O: Clone> Parser<I, O> for Zero<I, O> {
    fn parse(&self, _input: &[I], pos: usize) -> ParseResult<O> {
        Ok((pos, self.value.clone()))
    }
}

#[derive(Clone)]
pub struct Fail<I, O> {
    message: String,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O> Fail<I, O> {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            _phantom: PhantomData,
        }
    }
}

impl<I, O> Parser<I, O> for Fail<I, O> {
    fn parse(&self, _input: &[I], _pos: usize) -> ParseResult<O> {
        Err(ParseError::Fail(self.message.clone()))
    }
}

/// Matches one element for which `f` returns `Some`.
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        match input.get(pos).map(|x| (self.f)(x)) {
            Some(Some(result)) => Ok((pos + 1, result)),
            Some(None) => {
                record_failure(pos);
                Err(ParseError::NoAlternative { position: pos })
            }
            None => {
                record_failure(pos);
                Err(ParseError::EOF)
            }
        }
    }
}

/// Succeeds without consuming when `parser` would fail.
pub struct Not<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> Not<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, ()> for Not<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        match self.parser.parse(input, pos) {
            Ok(_) => Err(ParseError::NoAlternative { position: pos }),
            Err(_) => Ok((pos, ())),
        }
    }
}

pub struct Choice<I, O> {
    parsers: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Choice<I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O>>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        for parser in &self.parsers {
            if let Ok(result) = parser.parse(input, pos) {
                return Ok(result);
            }
        }
        Err(ParseError::NoAlternative { position: pos })
    }
}

#[derive(Clone)]
pub struct Preceded<P1, P2, I, O> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O)>,
}

impl<P1, P2, I, O> Preceded<P1, P2, I, O> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O> Parser<I, O> for Preceded<P1, P2, I, O>
where
    P1: Parser<I, ()>,
    P2: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.parser1.parse(input, pos)?;
        self.parser2.parse(input, pos)
    }
}

#[derive(Clone)]
pub struct Terminated<P1, P2, I, O> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O)>,
}

impl<P1, P2, I, O> Terminated<P1, P2, I, O> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O> Parser<I, O> for Terminated<P1, P2, I, O>
where
    P1: Parser<I, O>,
    P2: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, value) = self.parser1.parse(input, pos)?;
        let (pos, _) = self.parser2.parse(input, pos)?;
        Ok((pos, value))
    }
}

#[derive(Clone)]
pub struct Map<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> Map<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        self.parser
            .parse(input, pos)
            .map(|(pos, value)| (pos, (self.f)(value)))
    }
}

/// Like [`Map`] but the conversion may reject the parsed value.
#[derive(Clone)]
pub struct TryMap<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> TryMap<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for TryMap<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> Result<B, String>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (new_pos, value) = self.parser.parse(input, pos)?;
        (self.f)(value)
            .map(|mapped| (new_pos, mapped))
            .map_err(|message| {
                record_rejection(pos, new_pos, &message);
                ParseError::Fail(message)
            })
    }
}

#[derive(Clone)]
pub struct AsUnit<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> AsUnit<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        self.parser.parse(input, pos).map(|(pos, _)| (pos, ()))
    }
}

#[derive(Clone)]
pub struct Many<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Many<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        while let Ok((new_pos, value)) = self.parser.parse(input, current_pos) {
            results.push(value);
            // zero-width matches would loop forever
            if new_pos == current_pos {
                break;
            }
            current_pos = new_pos;
        }

        Ok((current_pos, results))
    }
}

#[derive(Clone)]
pub struct Many1<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Many1<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many1<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let (mut current_pos, first) = self.parser.parse(input, pos)?;
        let mut results = vec![first];

        while let Ok((new_pos, value)) = self.parser.parse(input, current_pos) {
            results.push(value);
            if new_pos == current_pos {
                break;
            }
            current_pos = new_pos;
        }

        Ok((current_pos, results))
    }
}

/// Items separated by `separator`. A trailing separator is left unconsumed
/// so callers can tell `(a)` from `(a,)`.
pub struct SeparatedList<P, S, I, O> {
    item_parser: P,
    separator_parser: S,
    _phantom: PhantomData<(I, O)>,
}

impl<P, S, I, O> SeparatedList<P, S, I, O> {
    pub fn new(item_parser: P, separator_parser: S) -> Self {
        Self {
            item_parser,
            separator_parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let Ok((mut current_pos, first)) = self.item_parser.parse(input, pos) else {
            return Ok((pos, results));
        };
        results.push(first);

        // 区切り文字の後に要素が続く場合のみ位置を進める
        while let Ok((sep_pos, _)) = self.separator_parser.parse(input, current_pos) {
            match self.item_parser.parse(input, sep_pos) {
                Ok((new_pos, value)) => {
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(_) => break,
            }
        }

        Ok((current_pos, results))
    }
}

#[derive(Clone)]
pub struct Optional<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Optional<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        match self.parser.parse(input, pos) {
            Ok((new_pos, value)) => Ok((new_pos, Some(value))),
            Err(_) => Ok((pos, None)),
        }
    }
}

#[derive(Clone)]
pub struct Tuple2<P1, P2, I, O1, O2> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Tuple2<P1, P2, I, O1, O2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O1, O2> Parser<I, (O1, O2)> for Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, first) = self.parser1.parse(input, pos)?;
        let (pos, second) = self.parser2.parse(input, pos)?;
        Ok((pos, (first, second)))
    }
}

#[derive(Clone)]
pub struct Tuple3<P1, P2, P3, I, O1, O2, O3> {
    parser1: P1,
    parser2: P2,
    parser3: P3,
    _phantom: PhantomData<(I, O1, O2, O3)>,
}

impl<P1, P2, P3, I, O1, O2, O3> Tuple3<P1, P2, P3, I, O1, O2, O3> {
    pub fn new(parser1: P1, parser2: P2, parser3: P3) -> Self {
        Self {
            parser1,
            parser2,
            parser3,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, P3, I, O1, O2, O3> Parser<I, (O1, O2, O3)> for Tuple3<P1, P2, P3, I, O1, O2, O3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3)> {
        let (pos, first) = self.parser1.parse(input, pos)?;
        let (pos, second) = self.parser2.parse(input, pos)?;
        let (pos, third) = self.parser3.parse(input, pos)?;
        Ok((pos, (first, second, third)))
    }
}

#[derive(Clone)]
pub struct Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4> {
    parser1: P1,
    parser2: P2,
    parser3: P3,
    parser4: P4,
    _phantom: PhantomData<(I, O1, O2, O3, O4)>,
}

impl<P1, P2, P3, P4, I, O1, O2, O3, O4> Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4> {
    pub fn new(parser1: P1, parser2: P2, parser3: P3, parser4: P4) -> Self {
        Self {
            parser1,
            parser2,
            parser3,
            parser4,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, P3, P4, I, O1, O2, O3, O4> Parser<I, (O1, O2, O3, O4)>
    for Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
    P4: Parser<I, O4>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3, O4)> {
        let (pos, first) = self.parser1.parse(input, pos)?;
        let (pos, second) = self.parser2.parse(input, pos)?;
        let (pos, third) = self.parser3.parse(input, pos)?;
        let (pos, fourth) = self.parser4.parse(input, pos)?;
        Ok((pos, (first, second, third, fourth)))
    }
}

#[derive(Clone)]
pub struct Delimited<L, P, R, I, O> {
    left: L,
    parser: P,
    right: R,
    _phantom: PhantomData<(I, O)>,
}

impl<L, P, R, I, O> Delimited<L, P, R, I, O> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, value))
    }
}

/// Pairs the parsed value with the range of input positions it consumed.
#[derive(Clone)]
pub struct Spanned<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> Spanned<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, (O, Range<usize>)> for Spanned<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O, Range<usize>)> {
        let (end, value) = self.parser.parse(input, pos)?;
        Ok((end, (value, pos..end)))
    }
}

#[derive(Clone)]
pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| ParseError::WithContext {
                message: self.context.to_string(),
                inner: Box::new(e),
            })
    }
}

/// Defers building `f()` until parse time; breaks recursive grammar cycles.
#[derive(Clone)]
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit(n: i32) -> Satisfy<i32, i32, impl Fn(&i32) -> Option<i32> + Clone> {
        Satisfy::new(move |x: &i32| if *x == n { Some(*x) } else { None })
    }

    #[test]
    fn test_equal() {
        let input = vec!['a', 'b'];
        assert_eq!(Equal::new('a').parse(&input, 0), Ok((1, 'a')));
        assert_eq!(
            Equal::new('a').parse(&input, 1),
            Err(ParseError::Unexpected {
                expected: "a".to_string(),
                found: "b".to_string(),
                position: 1
            })
        );
        assert_eq!(Equal::new('a').parse(&input, 2), Err(ParseError::EOF));
    }

    #[test]
    fn test_choice_takes_first_success() {
        let input = vec![1, 2, 3];
        let parser = Choice::new(vec![
            Box::new(Fail::<i32, i32>::new("fail")),
            Box::new(digit(2)),
            Box::new(Satisfy::new(|x: &i32| Some(*x * 10))),
        ]);
        assert_eq!(parser.parse(&input, 1), Ok((2, 2)));
        assert_eq!(parser.parse(&input, 0), Ok((1, 10)));
        assert_eq!(
            parser.parse(&input, 3),
            Err(ParseError::NoAlternative { position: 3 })
        );
    }

    #[test]
    fn test_separated_list_leaves_trailing_separator() {
        let input = vec![1, 0, 1, 0];
        let parser = SeparatedList::new(digit(1), AsUnit::new(digit(0)));
        assert_eq!(parser.parse(&input, 0), Ok((3, vec![1, 1])));

        let empty: Vec<i32> = vec![];
        assert_eq!(parser.parse(&empty, 0), Ok((0, vec![])));
    }

    #[test]
    fn test_many_and_many1() {
        let input = vec![1, 1, 2];
        assert_eq!(Many::new(digit(1)).parse(&input, 0), Ok((2, vec![1, 1])));
        assert_eq!(Many::new(digit(2)).parse(&input, 0), Ok((0, vec![])));
        assert!(Many1::new(digit(2)).parse(&input, 0).is_err());
    }

    #[test]
    fn test_spanned_reports_consumed_range() {
        let input = vec![1, 1, 2];
        let parser = Spanned::new(Many1::new(digit(1)));
        assert_eq!(parser.parse(&input, 0), Ok((2, (vec![1, 1], 0..2))));
    }

    #[test]
    fn test_not_is_zero_width() {
        let input = vec![1, 2];
        assert_eq!(Not::new(digit(2)).parse(&input, 0), Ok((0, ())));
        assert!(Not::new(digit(1)).parse(&input, 0).is_err());
    }

    #[test]
    fn test_try_map_rejects() {
        let input = vec![5];
        let parser = TryMap::new(Satisfy::new(|x: &i32| Some(*x)), |x: i32| {
            if x > 3 { Err("too big".to_string()) } else { Ok(x) }
        });
        assert_eq!(
            parser.parse(&input, 0),
            Err(ParseError::Fail("too big".to_string()))
        );
    }

    #[test]
    fn test_with_context_wraps_error() {
        let input = vec![1];
        let parser = WithContext::new(digit(2), "two");
        assert!(matches!(
            parser.parse(&input, 0),
            Err(ParseError::WithContext { message, .. }) if message == "two"
        ));
    }
}
