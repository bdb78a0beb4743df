use sea_orm::{ConnectionTrait, DbErr, PaginatorTrait, SelectorTrait};
use serde::ser::{Serialize, SerializeStruct, Serializer};

pub const SONG_PAGE_SIZE: u64 = 20;
pub const ARTIST_PAGE_SIZE: u64 = 24;
pub const HISTORY_PAGE_SIZE: u64 = 50;

/// A requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub page_size: u64,
}

impl PageParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Lenient parse of a raw `page` parameter: anything that is not a
    /// positive integer means page 1.
    pub fn parse(raw: Option<&str>, page_size: u64) -> Self {
        let page = raw
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(1);
        Self::new(page, page_size)
    }

    /// Past-the-end requests land on the last page.
    pub fn clamp(&self, num_pages: u64) -> u64 {
        self.page.min(num_pages.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub num_pages: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            num_pages: self.num_pages,
            page_size: self.page_size,
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Page", 7)?;
        st.serialize_field("items", &self.items)?;
        st.serialize_field("total", &self.total)?;
        st.serialize_field("page", &self.page)?;
        st.serialize_field("num_pages", &self.num_pages)?;
        st.serialize_field("page_size", &self.page_size)?;
        st.serialize_field("has_next", &self.has_next())?;
        st.serialize_field("has_previous", &self.has_previous())?;
        st.end()
    }
}

pub async fn fetch_page<'db, C, P>(
    query: P,
    db: &'db C,
    params: PageParams,
) -> Result<Page<<P::Selector as SelectorTrait>::Item>, DbErr>
where
    C: ConnectionTrait,
    P: PaginatorTrait<'db, C>,
{
    let paginator = query.paginate(db, params.page_size);
    let counts = paginator.num_items_and_pages().await?;
    let page = params.clamp(counts.number_of_pages);
    let items = paginator.fetch_page(page - 1).await?;
    Ok(Page {
        items,
        total: counts.number_of_items,
        page,
        num_pages: counts.number_of_pages.max(1),
        page_size: params.page_size,
    })
}
