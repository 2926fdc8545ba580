//! Root state: the search query plus the personal list.

use crate::models::Movie;
use crate::my_list::{ListStorage, MyList};
use crate::search::{self, SearchAction};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetSearchQuery(String),
    AddToMyList(Movie),
    RemoveFromMyList(String),
    ClearMyList,
}

pub struct RootState {
    pub search_query: String,
    pub my_list: MyList,
}

impl RootState {
    pub fn new(storage: Box<dyn ListStorage>) -> Self {
        Self {
            search_query: String::new(),
            my_list: MyList::load(storage),
        }
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::SetSearchQuery(query) => {
                self.search_query =
                    search::reduce(&self.search_query, SearchAction::SetSearchQuery(query));
            }
            Action::AddToMyList(movie) => {
                self.my_list.add(movie);
            }
            Action::RemoveFromMyList(id) => self.my_list.remove(&id),
            Action::ClearMyList => self.my_list.clear(),
        }
    }

    pub fn is_searching(&self) -> bool {
        search::is_searching(&self.search_query)
    }
}
