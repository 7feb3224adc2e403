use serde::Serialize;

/// Fixed-size slicing of an ordered result of `count` items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paginator {
    per_page: i64,
    count: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Paginator {
        Paginator {
            per_page: per_page.max(1),
            count: count.max(0),
        }
    }

    /// Always at least one page, even for an empty result.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves a raw `?page=` value: missing or non-numeric falls back to the
    /// first page, anything out of range to the last one.
    pub fn page_number(&self, raw: Option<&str>) -> i64 {
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(number)) => number,
            _ => return 1,
        };
        if number < 1 || number > self.num_pages() {
            self.num_pages()
        } else {
            number
        }
    }

    pub fn offset(&self, number: i64) -> i64 {
        (number - 1) * self.per_page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn page<T>(&self, number: i64, object_list: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        let has_previous = number > 1;
        let has_next = number < num_pages;
        Page {
            object_list,
            number,
            num_pages,
            count: self.count,
            has_previous,
            has_next,
            previous_page_number: if has_previous { Some(number - 1) } else { None },
            next_page_number: if has_next { Some(number + 1) } else { None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<i64>,
    pub next_page_number: Option<i64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}
