use std::rc::Rc;

/// Single-slot cache keyed by an input tuple.
///
/// Only the most recent key is remembered. Equality is pluggable; the default
/// is `PartialEq`, pass a custom one through [`Memo::with_eq`] for inputs
/// where that is not the right notion of "same" (e.g. NaN-aware floats).
pub struct Memo<K, V> {
	slot: Option<(K, V)>,
	eq: Rc<dyn Fn(&K, &K) -> bool>,
	hits: u64,
	misses: u64,
}

impl<K, V> Memo<K, V> {
	pub fn new() -> Self
	where
		K: PartialEq + 'static,
	{
		Self::with_eq(|a: &K, b: &K| a == b)
	}

	pub fn with_eq(eq: impl Fn(&K, &K) -> bool + 'static) -> Self {
		Memo {
			slot: None,
			eq: Rc::new(eq),
			hits: 0,
			misses: 0,
		}
	}

	pub fn get(&mut self, key: &K) -> Option<&V> {
		match &self.slot {
			Some((cached, value)) if (self.eq)(cached, key) => {
				self.hits += 1;
				Some(value)
			}
			_ => {
				self.misses += 1;
				None
			}
		}
	}

	pub fn insert(&mut self, key: K, value: V) {
		self.slot = Some((key, value));
	}

	pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
		if self.get(&key).is_none() {
			let value = compute(&key);
			self.slot = Some((key, value));
		}
		match &self.slot {
			Some((_, value)) => value,
			None => unreachable!("slot filled above"),
		}
	}

	pub fn clear(&mut self) {
		self.slot = None;
	}

	pub fn hits(&self) -> u64 {
		self.hits
	}

	pub fn misses(&self) -> u64 {
		self.misses
	}
}

impl<K: PartialEq + 'static, V> Default for Memo<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

/// `Object.is`-style float equality: NaN equals NaN, `0.0` differs from `-0.0`.
pub fn same_f64(a: &f64, b: &f64) -> bool {
	a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	#[test]
	fn recomputes_only_on_new_key() {
		let calls = Cell::new(0);
		let mut memo = Memo::new();
		let mut square = |k: i32| {
			*memo.get_or_insert_with(k, |k| {
				calls.set(calls.get() + 1);
				k * k
			})
		};

		assert_eq!(square(3), 9);
		assert_eq!(square(3), 9);
		assert_eq!(square(4), 16);
		assert_eq!(square(3), 9);
		assert_eq!(calls.get(), 3);
	}

	#[test]
	fn custom_equality() {
		let mut memo: Memo<f64, &str> = Memo::with_eq(same_f64);
		memo.insert(f64::NAN, "nan");
		assert_eq!(memo.get(&f64::NAN), Some(&"nan"));
		assert_eq!(memo.get(&1.0), None);
		assert_eq!((memo.hits(), memo.misses()), (1, 1));

		let mut plain: Memo<f64, &str> = Memo::new();
		plain.insert(f64::NAN, "nan");
		assert_eq!(plain.get(&f64::NAN), None);
	}
}
