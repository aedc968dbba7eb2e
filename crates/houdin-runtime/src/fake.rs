use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::page::{
  Element, FormPrompt, InjectedComponent, Modal, Notification, PageError, PageEvent, PageHost,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted reply to the next form prompt.
#[derive(Debug, Clone)]
enum FormAnswer {
  Submit(Map<String, Value>),
  Close,
  Ignore,
}

/// In-memory page for tests and headless runs.
///
/// Records everything actions do to it and lets the caller emit page events.
pub struct FakePage {
  url: Mutex<String>,
  tab_id: Option<u32>,
  elements: Mutex<HashMap<String, Element>>,
  clicks: Mutex<Vec<String>>,
  modals: Mutex<Vec<Modal>>,
  notifications: Mutex<Vec<Notification>>,
  components: Mutex<Vec<InjectedComponent>>,
  storage: Mutex<HashMap<String, String>>,
  prompts: Mutex<Vec<FormPrompt>>,
  answers: Mutex<VecDeque<FormAnswer>>,
  events: broadcast::Sender<PageEvent>,
}

impl FakePage {
  pub fn new(url: impl Into<String>) -> Self {
    let (events, _) = broadcast::channel(64);
    Self {
      url: Mutex::new(url.into()),
      tab_id: None,
      elements: Mutex::new(HashMap::new()),
      clicks: Mutex::new(Vec::new()),
      modals: Mutex::new(Vec::new()),
      notifications: Mutex::new(Vec::new()),
      components: Mutex::new(Vec::new()),
      storage: Mutex::new(HashMap::new()),
      prompts: Mutex::new(Vec::new()),
      answers: Mutex::new(VecDeque::new()),
      events,
    }
  }

  pub fn with_tab_id(mut self, tab_id: u32) -> Self {
    self.tab_id = Some(tab_id);
    self
  }

  pub fn with_element(self, selector: impl Into<String>, element: Element) -> Self {
    lock(&self.elements).insert(selector.into(), element);
    self
  }

  /// Deliver an event to every subscriber. Returns how many received it.
  pub fn emit(&self, event: PageEvent) -> usize {
    self.events.send(event).unwrap_or(0)
  }

  /// Change the URL and emit [`PageEvent::UrlChanged`].
  pub fn navigate(&self, url: impl Into<String>) -> usize {
    let url = url.into();
    *lock(&self.url) = url.clone();
    self.emit(PageEvent::UrlChanged { url })
  }

  pub fn submit_next_form(&self, values: Map<String, Value>) {
    lock(&self.answers).push_back(FormAnswer::Submit(values));
  }

  pub fn close_next_form(&self) {
    lock(&self.answers).push_back(FormAnswer::Close);
  }

  /// The next form stays open forever.
  pub fn ignore_next_form(&self) {
    lock(&self.answers).push_back(FormAnswer::Ignore);
  }

  pub fn element(&self, selector: &str) -> Option<Element> {
    lock(&self.elements).get(selector).cloned()
  }

  pub fn clicks(&self) -> Vec<String> {
    lock(&self.clicks).clone()
  }

  pub fn modals(&self) -> Vec<Modal> {
    lock(&self.modals).clone()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    lock(&self.notifications).clone()
  }

  pub fn components(&self) -> Vec<InjectedComponent> {
    lock(&self.components).clone()
  }

  pub fn prompts(&self) -> Vec<FormPrompt> {
    lock(&self.prompts).clone()
  }

  pub fn stored(&self, key: &str) -> Option<String> {
    lock(&self.storage).get(key).cloned()
  }

  pub fn subscriber_count(&self) -> usize {
    self.events.receiver_count()
  }
}

#[async_trait]
impl PageHost for FakePage {
  fn url(&self) -> String {
    lock(&self.url).clone()
  }

  fn tab_id(&self) -> Option<u32> {
    self.tab_id
  }

  async fn query(&self, selector: &str) -> Option<Element> {
    self.element(selector)
  }

  async fn click(&self, selector: &str) -> Result<(), PageError> {
    if !lock(&self.elements).contains_key(selector) {
      return Err(PageError::ElementNotFound {
        selector: selector.to_string(),
      });
    }
    lock(&self.clicks).push(selector.to_string());
    Ok(())
  }

  async fn set_value(&self, selector: &str, value: &str) -> Result<(), PageError> {
    let mut elements = lock(&self.elements);
    let element = elements
      .get_mut(selector)
      .ok_or_else(|| PageError::ElementNotFound {
        selector: selector.to_string(),
      })?;
    element.value = Some(value.to_string());
    Ok(())
  }

  async fn show_modal(&self, modal: Modal) -> Result<(), PageError> {
    lock(&self.modals).push(modal);
    Ok(())
  }

  async fn prompt_form(&self, form: FormPrompt) -> Result<Option<Map<String, Value>>, PageError> {
    lock(&self.prompts).push(form);
    let answer = lock(&self.answers).pop_front();
    match answer {
      Some(FormAnswer::Submit(values)) => Ok(Some(values)),
      Some(FormAnswer::Close) | None => Ok(None),
      Some(FormAnswer::Ignore) => {
        futures::future::pending::<()>().await;
        Ok(None)
      }
    }
  }

  fn notify(&self, notification: Notification) {
    lock(&self.notifications).push(notification);
  }

  fn inject_component(&self, component: InjectedComponent) -> Result<(), PageError> {
    if let Some(selector) = &component.target_selector
      && !lock(&self.elements).contains_key(selector)
    {
      return Err(PageError::ElementNotFound {
        selector: selector.clone(),
      });
    }
    let mut components = lock(&self.components);
    components.retain(|c| c.id != component.id);
    components.push(component);
    Ok(())
  }

  fn remove_component(&self, component_id: &str) {
    lock(&self.components).retain(|c| c.id != component_id);
  }

  async fn storage_get(&self, key: &str) -> Option<String> {
    self.stored(key)
  }

  async fn storage_set(&self, key: &str, value: Option<String>) {
    let mut storage = lock(&self.storage);
    match value {
      Some(value) => {
        storage.insert(key.to_string(), value);
      }
      None => {
        storage.remove(key);
      }
    }
  }

  fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
    self.events.subscribe()
  }
}
